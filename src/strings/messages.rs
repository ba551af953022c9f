//! # Messages
//!
//! Contains constant strings and format functions for user-facing messages.
//! Includes error messages, status updates, and feed notifications.

use serde_json::Value;

use crate::application::user_state::MenuState;
use crate::domain::types::{Network, TrendingToken};
use crate::infrastructure::dextools::TokenAnalysis;

pub const UNKNOWN_COMMAND: &str = "❓ Unknown command. Type `.help` for the list.";
pub const AI_BUSY: &str = "🐾 Kats is thinking too hard right now. Please try again in a minute.";
pub const SERVICE_UNAVAILABLE: &str =
    "⚠️ The market data service is unavailable right now. Please retry in a moment.";
pub const FEED_UNAVAILABLE: &str =
    "⚠️ The token feed is unavailable right now. Please retry in a moment.";
pub const NO_POOLS: &str = "❌ No liquidity pools found for this token.";
pub const CANCELLED: &str = "↩️ Cancelled. Back to the menu.";

pub const SCAN_PROMPT: &str = "🔍 Send me the token address to scan.";
pub const MEME_PROMPT: &str = "🎭 Tell me about the meme or token you want rated.";
pub const INVEST_PROMPT: &str = "💼 Describe the investment you are considering.";
pub const REPORT_PROMPT: &str = "📄 Paste the project or contract details for a rug report.";
pub const ANALYSING: &str = "🦴 Courage fetching... analysing";

pub const PRICE_USAGE: &str = "Usage: `.price <token_address>`";
pub const NETWORK_USAGE: &str = "Usage: `.network <ethereum|base|solana>`";
pub const NOT_WATCHING: &str = "You are not watching new tokens.";
pub const ALREADY_WATCHING: &str = "👀 You are already watching new tokens. Use `.unwatch` to stop.";
pub const WATCH_ENDED: &str = "Token watching session ended.";

pub fn task_failed(err: &str) -> String {
    format!("❌ **Task Failed**: {err}")
}

pub fn main_menu(network: &str) -> String {
    format!(
        "**🐱 Kats Menu** (network: {network})\n\
         * `.scan`: Scan a token\n\
         * `.trending`: Hot pools\n\
         * `.price <address>`: Token price\n\
         * `.meme` / `.invest` / `.report`: Ask Kats\n\
         * `.pump` / `.watch`: New token feed\n\
         * `.network <name>`: Switch network"
    )
}

pub fn trending_loading(network: Network) -> String {
    format!(
        "🦴 Courage fetching... Loading trending tokens on {}",
        network.display_name()
    )
}

pub fn trending(network: Network, tokens: &[TrendingToken]) -> String {
    if tokens.is_empty() {
        return format!("No trending tokens found on {}.", network.display_name());
    }

    let mut message = format!(
        "🔥 **Top Trending Tokens on {}**\n\n",
        network.display_name()
    );
    for token in tokens {
        message.push_str(&format!(
            "{}. **{}**\n• Name: {}\n• Address: `{}`\n• [View on Dextools]({})\n",
            token.rank,
            token.symbol,
            token.name,
            short_address(&token.address),
            dextools_url(network, &token.address),
        ));
    }
    message
}

pub fn token_price(network: Network, address: &str, price: f64) -> String {
    format!(
        "💲 `{}` on {}: **${}**",
        short_address(address),
        network.display_name(),
        format_price(price)
    )
}

pub fn network_set(network: Network) -> String {
    format!("🌐 Network switched to **{}**.", network.display_name())
}

pub fn unknown_network(name: &str) -> String {
    format!("❌ Unsupported network: `{name}`. {NETWORK_USAGE}")
}

pub fn new_token(token: &Value) -> String {
    let field = |key: &str| match token.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    };
    format!(
        "🆕 **New Token Listed**\n\nName: {}\nSymbol: {}\nMint: `{}`\nTime: {}",
        field("name"),
        field("symbol"),
        field("mint"),
        chrono::Local::now().format("%H:%M:%S"),
    )
}

pub fn watch_started(minutes: u64) -> String {
    format!("👀 Watching for new tokens for {minutes} minute(s)... `.unwatch` to stop.")
}

pub fn status(state: &MenuState, feed: &str) -> String {
    let current = state
        .current_state
        .map_or("idle".to_string(), |s| s.to_string());
    let mut out = format!(
        "**📊 Status**\n* State: `{current}`\n* Waiting for input: {}\n* Network: {}\n* Token feed: {feed}",
        if state.is_waiting_for_input { "yes" } else { "no" },
        state.network,
    );
    if let Some(left) = state.expires_in {
        out.push_str(&format!("\n* Resets in: {} min", left.as_secs().div_ceil(60)));
    }
    out
}

pub fn token_analysis(analysis: &TokenAnalysis) -> String {
    let info = &analysis.info;
    let text = |value: &Value, pointer: &str| {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string()
    };
    let number = |value: &Value, pointer: &str| value.pointer(pointer).and_then(Value::as_f64);
    let flag = |pointer: &str| match analysis.audit.pointer(pointer).and_then(Value::as_str) {
        Some("yes") => "⚠️ yes",
        Some("no") => "✅ no",
        _ => "❔ unknown",
    };

    let mut report = format!(
        "**🔍 {} ({})** on {}\n",
        text(info, "/name"),
        text(info, "/symbol"),
        analysis.network.display_name()
    );
    report.push_str(&format!(
        "* Pool: `{}` ({})\n",
        short_address(&text(&analysis.pool, "/address")),
        text(&analysis.pool, "/exchange/name"),
    ));
    if let Some(price) = number(&analysis.price, "/price") {
        report.push_str(&format!("* Price: ${}\n", format_price(price)));
    }
    if let Some(change) = number(&analysis.price, "/variation24h") {
        report.push_str(&format!("* 24h: {change:+.2}%\n"));
    }
    if let Some(liquidity) = number(&analysis.liquidity, "/liquidity") {
        report.push_str(&format!("* Liquidity: ${liquidity:.0}\n"));
    }
    if let Some(score) = number(&analysis.score, "/dextScore/total") {
        report.push_str(&format!("* DEXT score: {score:.0}/100\n"));
    }
    report.push_str(&format!(
        "\n**Audit**\n* Honeypot: {}\n* Mintable: {}\n* Open source: {}",
        flag("/isHoneypot"),
        flag("/isMintable"),
        match analysis.audit.pointer("/isOpenSource").and_then(Value::as_str) {
            Some("yes") => "✅ yes",
            Some("no") => "⚠️ no",
            _ => "❔ unknown",
        },
    ));
    report
}

fn dextools_url(network: Network, address: &str) -> String {
    format!(
        "https://www.dextools.io/app/en/{}/pair-explorer/{address}",
        network.dextools_segment()
    )
}

fn short_address(address: &str) -> String {
    match (address.get(..6), address.len().checked_sub(4).and_then(|i| address.get(i..))) {
        (Some(head), Some(tail)) if address.len() > 12 => format!("{head}...{tail}"),
        _ => address.to_string(),
    }
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.8}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0x1234567890abcdef1234"),
            "0x1234...1234"
        );
        assert_eq!(short_address("0xabc"), "0xabc");
    }

    #[test]
    fn test_trending_lists_tokens() {
        let tokens = vec![TrendingToken {
            rank: 1,
            name: "Kats Coin".to_string(),
            symbol: "KATS".to_string(),
            address: "0x1234567890abcdef1234".to_string(),
        }];
        let message = trending(Network::Ethereum, &tokens);
        assert!(message.contains("Top Trending Tokens on Ethereum"));
        assert!(message.contains("1. **KATS**"));
        assert!(message.contains("/ether/pair-explorer/0x1234567890abcdef1234"));

        assert!(trending(Network::Base, &[]).contains("No trending tokens"));
    }

    #[test]
    fn test_new_token_tolerates_missing_fields() {
        let message = new_token(&json!({"symbol": "PEPE", "mint": "So1ana"}));
        assert!(message.contains("Symbol: PEPE"));
        assert!(message.contains("Name: ?"));
        assert!(message.contains("`So1ana`"));
    }

    #[test]
    fn test_token_analysis_report() {
        let analysis = TokenAnalysis {
            network: Network::Base,
            pool: json!({"address": "0xpool", "exchange": {"name": "Aerodrome"}}),
            info: json!({"name": "Kats", "symbol": "KATS"}),
            score: json!({"dextScore": {"total": 87}}),
            audit: json!({"isHoneypot": "no", "isMintable": "yes"}),
            price: json!({"price": 0.000123, "variation24h": -4.5}),
            liquidity: json!({"liquidity": 52000.4}),
        };
        let report = token_analysis(&analysis);
        assert!(report.contains("Kats (KATS)** on Base"));
        assert!(report.contains("Price: $0.00012300"));
        assert!(report.contains("24h: -4.50%"));
        assert!(report.contains("DEXT score: 87/100"));
        assert!(report.contains("Honeypot: ✅ no"));
        assert!(report.contains("Mintable: ⚠️ yes"));
        assert!(report.contains("Open source: ❔ unknown"));
    }
}
