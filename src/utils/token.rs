use rand::Rng;

const GROUP_ID_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const GROUP_ID_LENGTH: usize = 6;

/// Random five digit assessment id, `10000..=99999`.
pub fn generate_assessment_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(10_000..=99_999u32).to_string()
}

pub fn generate_group_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GROUP_ID_LENGTH)
        .map(|_| GROUP_ID_CHARSET[rng.gen_range(0..GROUP_ID_CHARSET.len())] as char)
        .collect()
}

/// Client-chosen group ids follow the generated format: up to six characters
/// from the same charset, so they stay safe inside download filenames.
pub fn is_valid_group_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= GROUP_ID_LENGTH
        && id.bytes().all(|b| GROUP_ID_CHARSET.contains(&b))
}
