use sha2::{Digest, Sha256};

const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;

/// Deterministic placeholder for `seed`: `{base}/seed/{hash}/600/400`.
///
/// The hash is the first 64 bits of SHA-256 in hex, so equal seeds map to
/// the same image and different articles almost never collide.
pub fn placeholder_url(base: &str, seed: &str) -> String {
    let hash = format!("{:x}", Sha256::digest(seed.as_bytes()));
    format!(
        "{}/seed/{}/{WIDTH}/{HEIGHT}",
        base.trim_end_matches('/'),
        &hash[..16]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_placeholder_is_stable() {
        let a = placeholder_url("https://picsum.photos", "https://news.example/1");
        let b = placeholder_url("https://picsum.photos/", "https://news.example/1");
        assert_eq!(a, b);
        assert!(a.starts_with("https://picsum.photos/seed/"));
        assert!(a.ends_with("/600/400"));
    }

    #[test]
    fn test_placeholder_differs_per_seed() {
        let a = placeholder_url("https://picsum.photos", "https://news.example/1");
        let b = placeholder_url("https://picsum.photos", "https://news.example/2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_hash() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(
            placeholder_url("https://p", "abc"),
            "https://p/seed/ba7816bf8f01cfea/600/400"
        );
    }
}
