use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const CONTEST_ID_LEN: usize = 9;

/// Client-generated contest identifier: lowercase base-36 characters.
pub fn generate_contest_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| char::from(b).to_ascii_lowercase())
        .take(CONTEST_ID_LEN)
        .collect()
}
