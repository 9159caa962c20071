use rand::distributions::Alphanumeric;
use rand::Rng;

pub(crate) const DEFAULT_AUTO_ID_LENGTH: usize = 20;

/// Generates a random alphanumeric document ID.
///
/// With the default length of 20 characters there are 62^20 possible IDs,
/// so collisions within one collection are not a practical concern.
pub(crate) fn auto_id(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
