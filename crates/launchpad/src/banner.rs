//! Welcome banner.

use colored::Colorize;
use launchpad_core::console;

const BANNER: &str = r"
  _                           _                     _
 | |    __ _ _   _ _ __   ___| |__  _ __   __ _  __| |
 | |   / _` | | | | '_ \ / __| '_ \| '_ \ / _` |/ _` |
 | |__| (_| | |_| | | | | (__| | | | |_) | (_| | (_| |
 |_____\__,_|\__,_|_| |_|\___|_| |_| .__/ \__,_|\__,_|
                                   |_|
";

pub fn print_banner() {
    println!("{}", BANNER.green());
    println!(
        "{}",
        format!("Unified service launcher v{}", env!("CARGO_PKG_VERSION")).blue()
    );
    println!("{}", "Press Ctrl+C to stop all services".yellow());
    console::separator();
}
