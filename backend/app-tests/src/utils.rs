use rand::distributions::{Distribution, Uniform};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random `[a-z0-9]` string; safe to embed in Elasticsearch index names.
pub fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let pick = Uniform::from(0..ALPHABET.len());
    (0..len)
        .map(|_| ALPHABET[pick.sample(&mut rng)] as char)
        .collect()
}
