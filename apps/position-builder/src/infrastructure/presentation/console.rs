//! Console Presentation Sink
//!
//! Renders each snapshot as plain text: the legs table, both composite
//! prices, net delta, the status line and a coarse payoff chart.

use std::fmt::Write as _;
use std::io::Write;

use parking_lot::Mutex;

use crate::application::ports::{PresentationSink, Snapshot};
use crate::domain::pricing::{PayoffCurve, format_total};

/// Rows shown in the payoff chart.
const CHART_ROWS: usize = 11;
/// Width of the longest chart bar.
const CHART_WIDTH: f64 = 30.0;

const MISSING: &str = "—";

/// Writes rendered snapshots to a writer, stdout by default.
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink {
    /// Render to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Render to `out`.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Take the writer back.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> PresentationSink for ConsoleSink<W> {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        let text = render_snapshot(snapshot);
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "Failed to write snapshot to console");
        }
    }
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{v:.2}"))
}

/// Render a snapshot as text.
#[must_use]
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut text = String::new();

    if snapshot.position.is_empty() {
        text.push_str("(no legs)\n");
    } else {
        let _ = writeln!(
            text,
            "{:>2}  {:<6} {:>4}  {:<10} {:>9}  {:<5} {:>8} {:>8} {:>7}",
            "#", "Action", "Qty", "Expiration", "Strike", "Right", "Bid", "Ask", "Delta"
        );
        for (i, leg) in snapshot.position.iter().enumerate() {
            let quote = leg.quote();
            let _ = writeln!(
                text,
                "{:>2}  {:<6} {:>4}  {:<10} {:>9}  {:<5} {:>8} {:>8} {:>7}",
                i + 1,
                leg.action().to_string(),
                leg.multiplier(),
                leg.key().expiration.to_string(),
                leg.key().strike.to_string(),
                leg.key().right.to_string(),
                cell(quote.and_then(|q| q.bid())),
                cell(quote.and_then(|q| q.ask())),
                cell(quote.and_then(|q| q.delta())),
            );
        }
    }

    let _ = writeln!(text, "Lazy:   {}", format_total(snapshot.totals.lazy));
    let _ = writeln!(text, "Smart:  {}", format_total(snapshot.totals.smart));
    let _ = writeln!(text, "Delta:  {}", cell(snapshot.totals.net_delta));
    let _ = writeln!(
        text,
        "Status: {}{}",
        snapshot.status,
        if snapshot.refreshing { " (refreshing)" } else { "" }
    );

    if let Some(curve) = &snapshot.curve {
        render_curve(&mut text, curve);
    }

    text
}

fn render_curve(text: &mut String, curve: &PayoffCurve) {
    let scale = curve
        .points()
        .map(|p| p.pnl.abs())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let count = curve.points().len();
    let stride = count.div_ceil(CHART_ROWS).max(1);
    let last = count.saturating_sub(1);
    // the high end is always drawn, even when it falls between rows
    let tail = (last % stride != 0)
        .then(|| curve.points().nth(last))
        .flatten();

    let _ = writeln!(text, "P&L at expiration (cost {:+.2}):", curve.cost_basis());
    for point in curve.points().step_by(stride).chain(tail) {
        let len = ((point.pnl.abs() / scale) * CHART_WIDTH).round() as usize;
        let bar = if point.pnl < 0.0 {
            "-".repeat(len)
        } else {
            "+".repeat(len)
        };
        let _ = writeln!(text, "  {:>10.2} {:>10.2} |{bar}", point.underlying, point.pnl);
    }
}
