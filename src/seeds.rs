/// Default seed URLs for a fresh crawl with no checkpoint and no
/// operator-supplied seed list.
pub const DEFAULT_SEEDS: &[&str] = &[
    "https://gov.si",
    "https://evem.gov.si",
    "https://e-uprava.gov.si",
    "https://e-prostor.gov.si",
];
