//! Console rendering of snapshots, progress and reports

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use equity_research::{MarketSnapshot, ProgressEvent, ResearchReport};

/// Most recent bars shown in the price table
const RECENT_BARS: usize = 10;

pub fn snapshot(snapshot: &MarketSnapshot) -> String {
    let mut out = format!(
        "{} ({})\nSector: {} | Industry: {}\n",
        snapshot.company_name,
        snapshot.ticker,
        snapshot.sector_display(),
        snapshot.industry_display()
    );

    if let Some(summary) = snapshot.summary() {
        out.push_str(&format!(
            "{}: {:.2} -> {:.2} ({:+.2}%), range {:.2} - {:.2} over {} trading days\n",
            snapshot.lookback,
            summary.first_close,
            summary.last_close,
            summary.change_percent,
            summary.period_low,
            summary.period_high,
            summary.trading_days
        ));
    }

    out.push_str(&bars_table(snapshot).to_string());
    out.push('\n');
    out.push_str(&metrics_table(snapshot).to_string());
    out
}

fn bars_table(snapshot: &MarketSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Date", "Open", "High", "Low", "Close", "Volume"]);

    let skip = snapshot.bars.len().saturating_sub(RECENT_BARS);
    for bar in snapshot.bars.iter().skip(skip) {
        table.add_row(vec![
            Cell::new(bar.timestamp.format("%Y-%m-%d")),
            price_cell(bar.open),
            price_cell(bar.high),
            price_cell(bar.low),
            price_cell(bar.close),
            Cell::new(bar.volume.map_or_else(|| "N/A".to_string(), |v| v.to_string()))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn metrics_table(snapshot: &MarketSnapshot) -> Table {
    let metrics = &snapshot.metrics;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Market Cap", "P/E Ratio", "Dividend Yield", "52W High/Low"])
        .add_row(vec![
            metrics.market_cap_display(),
            metrics.pe_ratio_display(),
            metrics.dividend_yield_display(),
            metrics.fifty_two_week_display(),
        ]);
    table
}

fn price_cell(value: f64) -> Cell {
    Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right)
}

pub fn progress(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Milestone { percent, label } if label.is_empty() => format!("[{percent:>3}%]"),
        ProgressEvent::Milestone { percent, label } => format!("[{percent:>3}%] {label}"),
        ProgressEvent::Status { label } => format!("       {label}"),
        ProgressEvent::Failed { kind, message } => format!("[fail] {kind}: {message}"),
    }
}

/// Report text followed by a note on any sections the check did not find
pub fn report(report: &ResearchReport) -> String {
    let mut out = report.text.clone();
    if !report.coverage.missing.is_empty() {
        let missing: Vec<&str> = report.coverage.missing.iter().map(|s| s.title()).collect();
        out.push_str(&format!("\n\n(note: no heading found for {})", missing.join(", ")));
    }
    out
}
