//! JP-011: Deterministic network values for the deployment.

use crate::tripwire::hasher;

/// Third octet of the compose subnet: first byte of BLAKE3(app_id) mod 255.
pub fn subnet_octet(app_id: &str) -> u8 {
    hasher::digest(app_id.as_bytes())[0] % 255
}

/// Bridge network subnet for `app_id`.
pub fn subnet(app_id: &str) -> String {
    format!("172.28.{}.0/24", subnet_octet(app_id))
}

/// nginx `server_name` for a domain template. A `{tenant}` token becomes a
/// named capture; anything else is used as a literal host name.
pub fn server_name(domain: &str) -> String {
    const TOKEN: &str = "{tenant}";
    if !domain.contains(TOKEN) {
        return domain.to_string();
    }
    let pattern = domain
        .split(TOKEN)
        .map(|part| part.replace('.', "\\."))
        .collect::<Vec<_>>()
        .join("(?<tenant>[^.]+)");
    format!("~^{}$", pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jp011_subnet_is_stable() {
        let a = subnet("barbershop");
        assert_eq!(a, subnet("barbershop"));
        assert!(a.starts_with("172.28."));
        assert!(a.ends_with(".0/24"));
        assert!(subnet_octet("barbershop") < 255);
    }

    #[test]
    fn test_jp011_subnet_octet_matches_digest() {
        let expected = blake3::hash(b"demo").as_bytes()[0] % 255;
        assert_eq!(subnet_octet("demo"), expected);
    }

    #[test]
    fn test_jp011_server_name() {
        assert_eq!(
            server_name("{tenant}.run"),
            "~^(?<tenant>[^.]+)\\.run$"
        );
        assert_eq!(server_name("shop.example.com"), "shop.example.com");
    }
}
