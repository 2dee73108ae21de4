use capstan_kernel::SAFE_ALPHABET;
use capstan_kernel::request_id;

#[test]
fn generates_expected_length_and_charset() {
    let id = request_id!();
    assert_eq!(id.len(), 12);

    for ch in id.chars() {
        assert!(SAFE_ALPHABET.contains(&ch), "unexpected character in request id: {ch}");
    }
}

#[test]
fn custom_length() {
    assert_eq!(request_id!(20).len(), 20);
}

#[test]
fn ids_do_not_repeat() {
    let ids: std::collections::HashSet<_> = (0..256).map(|_| request_id!()).collect();
    assert_eq!(ids.len(), 256);
}
