//! Output formatting utilities.

use colored::Colorize;
use keyforge_crypto::DerivationPath;
use keyforge_types::Address;

/// Format address (short version).
pub fn format_address_short(addr: &Address) -> String {
    let s = addr.to_string();
    format!("{}...{}", &s[..10], &s[s.len() - 8..])
}

/// Print success message.
pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

/// Print error message.
pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

/// Print warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{}", format!("⚠ {}", msg).yellow());
}

/// Print info message.
pub fn print_info(msg: &str) {
    eprintln!("{}", format!("ℹ {}", msg).blue());
}

/// Print derived accounts as `path  address` rows.
pub fn print_accounts(accounts: &[(DerivationPath, Address)]) {
    let width = accounts
        .iter()
        .map(|(p, _)| p.to_string().len())
        .max()
        .unwrap_or(0);
    for (path, address) in accounts {
        println!(
            "{:<width$}  {}",
            path.to_string(),
            address.to_string().bright_cyan(),
            width = width
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_address_short() {
        let addr: Address = "0xfDd85780CB96f4712a869aB4d04f9D80c3CeE283".parse().unwrap();
        assert_eq!(format_address_short(&addr), "0xfDd85780...c3CeE283");
    }
}
