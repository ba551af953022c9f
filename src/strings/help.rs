//! # Help Text
//!
//! Help message for bot commands.
//! Displayed to the user via the `.help` command.

pub const MAIN: &str = concat!(
    "**🐱 Trenchbot Help**\n",
    "Use: .command _args_\n",
    "\n",
    "**📈 Market**\n",
    "* scan: Analyse a token address\n",
    "* trending [network]: Top 10 hot pools\n",
    "* price [address]: Token price\n",
    "* network [ethereum|base|solana]: Switch network\n",
    "\n",
    "**🤖 Ask Kats**\n",
    "* meme: Rate a meme coin\n",
    "* invest: Investment analysis\n",
    "* report: Rug report\n",
    "* or start a message with \"hey kats\"\n",
    "\n",
    "**💊 Pump.fun**\n",
    "* pump: Next new token\n",
    "* watch / unwatch: Stream new tokens\n",
    "\n",
    "**⚡ Misc**\n",
    "* menu\n",
    "* cancel\n",
    "* status\n"
);
