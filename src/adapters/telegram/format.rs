//! Alert & Status Message Formatting
//!
//! Pure text builders for every message the service sends. All output is
//! Telegram HTML; user-controlled strings (token names, symbols) go through
//! [`esc`] first.

use crate::domain::{FilterConfig, TokenSnapshot};

/// Escape the three characters Telegram HTML cares about.
pub fn esc(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// "$1,234,567" or "N/A" when the provider reported nothing useful.
pub fn fmt_usd(value: Option<f64>) -> String {
    match value {
        Some(v) if v > 0.0 => format!("${}", group_thousands(v.round() as u64)),
        _ => "N/A".to_string(),
    }
}

/// "+12.3%" / "-4.5%" or "N/A".
pub fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:+.1}%"),
        None => "N/A".to_string(),
    }
}

/// Compact age like "45m", "3h20m", "2d5h"; "N/A" while unknown.
pub fn format_age(created_at_ms: Option<i64>, now_ms: i64) -> String {
    let created = match created_at_ms {
        Some(ts) if ts > 0 && ts <= now_ms => ts,
        _ => return "N/A".to_string(),
    };
    let total_minutes = (now_ms - created) / 60_000;
    if total_minutes < 60 {
        return format!("{total_minutes}m");
    }
    let total_hours = total_minutes / 60;
    if total_hours < 24 {
        let minutes = total_minutes % 60;
        return if minutes > 0 {
            format!("{total_hours}h{minutes}m")
        } else {
            format!("{total_hours}h")
        };
    }
    let days = total_hours / 24;
    let hours = total_hours % 24;
    if hours > 0 {
        format!("{days}d{hours}h")
    } else {
        format!("{days}d")
    }
}

fn chart_url(snapshot: &TokenSnapshot) -> String {
    snapshot.url.clone().unwrap_or_else(|| {
        format!("https://dexscreener.com/solana/{}", snapshot.pair_address)
    })
}

/// Alert sent when a token enters a filter.
pub fn entry_alert(snapshot: &TokenSnapshot, label: &str, now_ms: i64) -> String {
    let symbol = esc(&snapshot.symbol);
    let name = esc(&snapshot.name);
    let price = snapshot
        .price_usd
        .map(|p| format!("${p}"))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "💎 <b>{label} — Entered Filter!</b>\n\
         ━━━━━━━━━━━━━━━━━━━━\n\
         🪙 <b>{symbol}</b>  |  {name}\n\
         🕐 Age: <b>{age}</b>\n\n\
         💰 Price:      <code>{price}</code>\n\
         💧 Liquidity:  <code>{liq}</code>\n\
         📊 Market Cap: <code>{mcap}</code>\n\
         📈 Volume 24h: <code>{vol}</code>\n\n\
         🔄 Txns  5m: {b5}B / {s5}S\n\
         🔄 Txns  1h: {b1}B / {s1}S\n\n\
         📉 Price Change:\n   \
         5m: {c5}  |  1h: {c1}\n   \
         6h: {c6}  |  24h: {c24}\n\n\
         📋 <b>Contract:</b>\n\
         <code>{address}</code>\n\n\
         🔗 <a href='{chart}'>DexScreener</a>  |  \
         <a href='https://solscan.io/token/{address}'>Solscan</a>  |  \
         <a href='https://pump.fun/coin/{address}'>Pump.fun</a>",
        label = esc(label),
        age = format_age(snapshot.pair_created_at_ms, now_ms),
        liq = fmt_usd(snapshot.liquidity_usd),
        mcap = fmt_usd(Some(snapshot.effective_market_cap())),
        vol = fmt_usd(snapshot.volume_24h_usd),
        b5 = snapshot.txns_5m_buys.unwrap_or(0),
        s5 = snapshot.txns_5m_sells.unwrap_or(0),
        b1 = snapshot.txns_1h_buys.unwrap_or(0),
        s1 = snapshot.txns_1h_sells.unwrap_or(0),
        c5 = fmt_pct(snapshot.price_change_5m_pct),
        c1 = fmt_pct(snapshot.price_change_1h_pct),
        c6 = fmt_pct(snapshot.price_change_6h_pct),
        c24 = fmt_pct(snapshot.price_change_24h_pct),
        address = snapshot.address,
        chart = chart_url(snapshot),
    )
}

/// Alert sent when the event stream reports a graduation.
pub fn graduation_alert(
    mint: &str,
    name: &str,
    symbol: &str,
    created_at_ms: Option<i64>,
    now_ms: i64,
) -> String {
    format!(
        "🎓 <b>Token Graduated to PumpSwap!</b>\n\
         ━━━━━━━━━━━━━━━━━━━━\n\
         🪙 <b>{symbol}</b>  |  {name}\n\
         📅 Token created: <b>{age} ago</b>\n\n\
         📋 <b>Contract:</b>\n\
         <code>{mint}</code>\n\n\
         🔗 <a href='https://dexscreener.com/solana/{mint}'>DexScreener</a>  |  \
         <a href='https://solscan.io/token/{mint}'>Solscan</a>  |  \
         <a href='https://pump.fun/coin/{mint}'>Pump.fun</a>",
        symbol = esc(symbol),
        name = esc(name),
        age = format_age(created_at_ms, now_ms),
    )
}

/// One numbered line of a /status reply.
pub fn status_line(index: usize, snapshot: &TokenSnapshot, now_ms: i64) -> String {
    format!(
        "{index}. <a href='{chart}'><b>{name}</b> ${symbol}</a>\n   \
         MC {mcap}  |  Vol {vol}  |  {chg}  |  {age} old",
        chart = chart_url(snapshot),
        name = esc(&snapshot.name),
        symbol = esc(&snapshot.symbol),
        mcap = fmt_usd(Some(snapshot.effective_market_cap())),
        vol = fmt_usd(snapshot.volume_24h_usd),
        chg = fmt_pct(snapshot.price_change_24h_pct),
        age = format_age(snapshot.pair_created_at_ms, now_ms),
    )
}

/// Banner sent once on startup.
pub fn startup_banner(
    filters: &[FilterConfig],
    poll_interval_secs: u64,
    stream_enabled: bool,
) -> String {
    let mut lines = vec![
        "✅ <b>PumpWatch Started</b>\n".to_string(),
        "Monitoring <b>PumpSwap (Solana)</b>:".to_string(),
    ];
    for filter in filters {
        lines.push(format!("  - {}: <i>{}</i>", esc(&filter.label), esc(&filter.summary())));
    }
    if stream_enabled {
        lines.push("  - Graduation stream: listening".to_string());
    }
    lines.push(format!("\nPolling every <b>{poll_interval_secs}s</b>"));
    lines.push("Commands: /status | /count | /seen | /missing | /help".to_string());
    lines.join("\n")
}
