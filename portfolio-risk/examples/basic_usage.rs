//! Example usage of the ledger and position sizer

use common::{Direction, PipConvention, StaticMarketView, StatsWindow, Trade, Utc};
use portfolio_risk::{PositionSizer, RiskParameters, TradeLedger};

fn main() -> anyhow::Result<()> {
    println!("=== Ledger & Position Sizer Example ===\n");

    let view = StaticMarketView::default();
    let mut ledger = TradeLedger::new(PipConvention::default());
    let mut sizer = PositionSizer::new(RiskParameters::default());

    // Size and open a position
    println!("Example 1: Sizing a position");
    let size = sizer.calculate_position_size("EUR/USD", 0.8, 1.2000, &ledger, &view);
    println!("  Size for confidence 0.80: {:.2}", size);

    let trade = Trade::open("EUR/USD", Direction::Buy, 1.2000, Utc::now(), size);
    let id = trade.id;
    ledger.open(trade);
    sizer.update_risk_state("EUR/USD", size, 1.2000, &view);
    println!("  Committed risk: {:.8}\n", sizer.risk_state().current_total_risk);

    // Close it and read the statistics back
    println!("Example 2: Closing the position");
    if let Some(closed) = ledger.close(id, 1.2025, Utc::now()) {
        sizer.release_risk(&closed.asset);
        println!("  P&L: {:.2} pips", closed.realized_pnl());
    }

    let stats = ledger.get_stats(StatsWindow::Day);
    println!("  Trades today: {}", stats.total_trades);
    println!("  Win rate: {:.1}%", stats.win_rate * 100.0);
    println!("  Committed risk after close: {:.8}", sizer.risk_state().current_total_risk);

    println!("\n=== Example Complete ===");
    Ok(())
}
