//! Human-friendly identifiers derived from opaque ids.

use md5::{Digest, Md5};

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brisk", "calm", "cosmic", "crisp", "dapper", "eager", "fancy", "gentle",
    "golden", "happy", "jolly", "keen", "lively", "lucky", "mellow", "nimble", "noble", "proud",
    "quick", "quiet", "rapid", "silent", "sleek", "solar", "steady", "swift", "tidy", "vivid",
    "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "bison", "cobra", "condor", "crane", "eagle", "falcon", "ferret", "gecko", "hawk",
    "heron", "ibis", "jaguar", "koala", "lemur", "lynx", "marten", "moose", "newt", "otter",
    "owl", "panda", "puma", "quail", "raven", "robin", "salmon", "tiger", "viper", "walrus",
    "wolf", "yak",
];

/// Derives a stable `adjective-noun-xx` name from an id.
///
/// The same id always maps to the same name. An empty id yields an empty name.
#[must_use]
pub fn generate_huid(id: &str) -> String {
    if id.is_empty() {
        return String::new();
    }

    let digest = Md5::digest(id.as_bytes());
    let adjective = ADJECTIVES[usize::from(digest[0]) % ADJECTIVES.len()];
    let noun = NOUNS[usize::from(digest[1]) % NOUNS.len()];
    let suffix = hex::encode(&digest[2..3]);

    format!("{adjective}-{noun}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huid_is_stable() {
        let a = generate_huid("3f1c0a4e-1111-2222-3333-444455556666");
        let b = generate_huid("3f1c0a4e-1111-2222-3333-444455556666");
        assert_eq!(a, b);
        assert_eq!(a.split('-').count(), 3);
        assert_eq!(a.rsplit('-').next().map(str::len), Some(2));
    }

    #[test]
    fn test_huid_differs_between_ids() {
        assert_ne!(generate_huid("executor-a"), generate_huid("executor-b"));
    }

    #[test]
    fn test_empty_id() {
        assert_eq!(generate_huid(""), "");
    }
}
