//! Startup banner and session summary display.

use crate::consts::{AUTHOR, HOMEPAGE, REPO, format_number};
use crate::provider::TokenUsage;

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub search: &'a str,
    pub router: &'a str,
    pub coder: &'a str,
    pub max_steps: usize,
    pub max_replans: usize,
    pub preferences: &'a str,
}

/// Print the startup banner with session info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║            F O R E M A N              ║
   ║    plans the work, works the plan     ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   repo      {}
   provider  {} ({})
   search    {}
   router    {}
   coder     {}
   budget    {} steps, {} replans
   prefs     {}
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.provider,
        info.model,
        info.search,
        info.router,
        info.coder,
        info.max_steps,
        info.max_replans,
        info.preferences,
    );
}

/// Print the session summary (token usage + farewell).
pub fn print_session_summary(usage: TokenUsage) {
    if usage.total() > 0 {
        println!(
            "session: {:>6} input + {:>6} output = {:>6} tokens",
            format_number(usage.input_tokens),
            format_number(usage.output_tokens),
            format_number(usage.total()),
        );
    }
    println!("goodbye.");
}
