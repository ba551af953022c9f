//! # Domain Types
//!
//! Common data structures and enums used across the application logic.

/// What kind of free-text input the bot expects next from a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserStateKind {
    MainMenu,
    WaitingMemeInput,
    WaitingInvestmentInput,
    WaitingLoanAnalysisConfirmation,
    WaitingScanInput,
    WaitingReportInput,
    WaitingPumpAction,
    WatchingPumpTokens,
    WaitingPriceAlert,
    WaitingEventDetails,
    WaitingTransferAddress,
    WaitingTransferAmount,
    WaitingWallet,
}

impl UserStateKind {
    /// States whose next free-text message goes to the AI/analysis layer.
    pub const AI_REQUIRED: [UserStateKind; 11] = [
        UserStateKind::WaitingMemeInput,
        UserStateKind::WaitingInvestmentInput,
        UserStateKind::WaitingLoanAnalysisConfirmation,
        UserStateKind::WaitingScanInput,
        UserStateKind::WaitingReportInput,
        UserStateKind::WaitingPumpAction,
        UserStateKind::WatchingPumpTokens,
        UserStateKind::WaitingPriceAlert,
        UserStateKind::WaitingEventDetails,
        UserStateKind::WaitingTransferAddress,
        UserStateKind::WaitingTransferAmount,
    ];

    pub fn requires_ai(&self) -> bool {
        Self::AI_REQUIRED.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStateKind::MainMenu => "MAIN_MENU",
            UserStateKind::WaitingMemeInput => "WAITING_MEME_INPUT",
            UserStateKind::WaitingInvestmentInput => "WAITING_INVESTMENT_INPUT",
            UserStateKind::WaitingLoanAnalysisConfirmation => "WAITING_LOAN_ANALYSIS_CONFIRMATION",
            UserStateKind::WaitingScanInput => "WAITING_SCAN_INPUT",
            UserStateKind::WaitingReportInput => "WAITING_REPORT_INPUT",
            UserStateKind::WaitingPumpAction => "WAITING_PUMP_ACTION",
            UserStateKind::WatchingPumpTokens => "WATCHING_PUMP_TOKENS",
            UserStateKind::WaitingPriceAlert => "WAITING_PRICE_ALERT",
            UserStateKind::WaitingEventDetails => "WAITING_EVENT_DETAILS",
            UserStateKind::WaitingTransferAddress => "WAITING_TRANSFER_ADDRESS",
            UserStateKind::WaitingTransferAmount => "WAITING_TRANSFER_AMOUNT",
            UserStateKind::WaitingWallet => "WAITING_WALLET",
        }
    }

    /// The system prompt family a free-text reply in this state is answered with.
    pub fn analysis_mode(&self) -> AnalysisMode {
        match self {
            UserStateKind::WaitingMemeInput => AnalysisMode::MemeCapital,
            UserStateKind::WaitingInvestmentInput
            | UserStateKind::WaitingLoanAnalysisConfirmation => AnalysisMode::Investment,
            UserStateKind::WaitingReportInput => AnalysisMode::Report,
            _ => AnalysisMode::Chat,
        }
    }
}

impl std::fmt::Display for UserStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects the system prompt used for an LLM completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    Chat,
    MemeCapital,
    Investment,
    Report,
}

/// Chains the bot can query on DexTools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Ethereum,
    Base,
    Solana,
}

impl Network {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" | "ether" => Some(Network::Ethereum),
            "base" => Some(Network::Base),
            "solana" | "sol" => Some(Network::Solana),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Base => "base",
            Network::Solana => "solana",
        }
    }

    /// Path segment DexTools uses for this chain.
    pub fn dextools_segment(&self) -> &'static str {
        match self {
            Network::Ethereum => "ether",
            Network::Base => "base",
            Network::Solana => "solana",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum",
            Network::Base => "Base",
            Network::Solana => "Solana",
        }
    }
}

/// One entry of a DexTools hot pools ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingToken {
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_required_set() {
        assert!(UserStateKind::WaitingPriceAlert.requires_ai());
        assert!(UserStateKind::WatchingPumpTokens.requires_ai());
        assert!(UserStateKind::WaitingTransferAmount.requires_ai());
        assert!(!UserStateKind::MainMenu.requires_ai());
        assert!(!UserStateKind::WaitingWallet.requires_ai());
    }

    #[test]
    fn test_state_displays_as_tag() {
        assert_eq!(UserStateKind::WaitingScanInput.to_string(), "WAITING_SCAN_INPUT");
        assert_eq!(
            UserStateKind::WaitingLoanAnalysisConfirmation.as_str(),
            "WAITING_LOAN_ANALYSIS_CONFIRMATION"
        );
    }

    #[test]
    fn test_network_segments() {
        assert_eq!(Network::from_str("ETH"), Some(Network::Ethereum));
        assert_eq!(Network::from_str("base").unwrap().dextools_segment(), "base");
        assert_eq!(Network::Ethereum.dextools_segment(), "ether");
        assert_eq!(Network::from_str("dogechain"), None);
    }
}
