//! Signal card rendering for the log notifier

use crate::types::TradeSignal;

fn check(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Multi-line human-readable summary of a signal
pub fn format_signal_card(signal: &TradeSignal) -> String {
    let kill_zone = signal
        .tags
        .kill_zone
        .map(|kz| kz.to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "=== {} {} ===\n\
         Score:      {:.2}\n\
         Price:      {:.2}\n\
         Entry:      {:.2} - {:.2}\n\
         Stop:       {:.2}\n\
         TP1 / TP2:  {:.2} / {:.2}\n\
         Risk:       {:.2}%\n\
         Session:    {} ({})\n\
         Delta:      {:+.2} | Macro {:+.1}\n\
         Retest: {} | Stop hunt: {} | Consolidation: {} | False breakout: {}\n\
         Time:       {}",
        signal.instrument,
        signal.direction,
        signal.score,
        signal.price,
        signal.entry_low,
        signal.entry_high,
        signal.stop_loss,
        signal.take_profit_1,
        signal.take_profit_2,
        signal.risk_pct,
        signal.tags.session,
        kill_zone,
        signal.delta,
        signal.macro_score,
        check(signal.tags.break_retest),
        check(signal.tags.stop_hunt),
        check(signal.tags.consolidation),
        check(signal.tags.false_breakout),
        signal.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
