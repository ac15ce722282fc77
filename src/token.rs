use rand::Rng;

/// The 62-character alphanumeric alphabet tokens are drawn from.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Token length attached to every uploaded row.
pub const ROW_TOKEN_LEN: usize = 24;

/// Length of client-generated document auto-IDs (the length Firestore
/// client SDKs use).
pub const DOC_ID_LEN: usize = 20;

/// Generate a random alphanumeric string of exactly `len` characters.
///
/// Each character is drawn uniformly from the 62-character alphanumeric
/// alphabet using a non-cryptographic source. No uniqueness guarantee is
/// made across calls; callers that need unguessable or collision-free
/// identifiers must layer that on top.
///
/// # Arguments
/// * `len` - Desired token length; `0` yields an empty string
///
/// # Returns
/// * `String` - The generated token
pub fn generate(len: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length() {
        for len in [0, 1, 8, 20, 24, 100] {
            assert_eq!(generate(len).chars().count(), len);
        }
    }

    #[test]
    fn stays_within_alphabet() {
        let token = generate(500);
        assert!(token.bytes().all(|b| CHARSET.contains(&b)));
    }

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(generate(0), "");
    }
}
