use super::*;

#[test]
fn parse_minutes_seconds_millis() {
    assert_eq!(parse_millis("1:52.345"), Some(112_345));
    assert_eq!(parse_millis(" 2:01.5 "), Some(121_500));
}

#[test]
fn parse_minutes_and_whole_seconds() {
    assert_eq!(parse_millis("1:59"), Some(119_000));
}

#[test]
fn parse_plain_seconds() {
    assert_eq!(parse_millis("58.9"), Some(58_900));
    assert_eq!(parse_millis("58,9"), Some(58_900));
}

#[test]
fn parse_rejects_malformed_times() {
    for raw in ["", "abc", "1:5.2", "1:60.000", "1:52.3456", "-1:00.000", "0", "1::00"] {
        assert_eq!(parse_millis(raw), None, "expected None for {raw:?}");
    }
}

#[test]
fn parse_rejects_times_past_the_cap() {
    assert_eq!(parse_millis("999999999999999999:00"), None);
    assert_eq!(parse_millis("18446744073709551"), None);
    assert_eq!(parse_millis("60:00.000"), None);
    assert_eq!(parse_millis("3600"), None);
}

#[test]
fn parse_accepts_just_under_the_cap() {
    assert_eq!(parse_millis("59:59.999"), Some(MAX_LAP_MILLIS - 1));
    assert_eq!(parse_millis("3599.999"), Some(MAX_LAP_MILLIS - 1));
}

#[test]
fn fastest_ignores_overflowing_entries() {
    assert_eq!(fastest(["999999999999999999:00", "1:52.900"]), Some(112_900));
}

#[test]
fn format_pads_seconds_and_millis() {
    assert_eq!(format_millis(112_345), "1:52.345");
    assert_eq!(format_millis(61_005), "1:01.005");
    assert_eq!(format_millis(58_900), "0:58.900");
}

#[test]
fn format_output_parses_back() {
    for ms in [58_900, 112_345, 600_001] {
        assert_eq!(parse_millis(&format_millis(ms)), Some(ms));
    }
}

#[test]
fn fastest_skips_unparsable_entries() {
    let laps = ["1:55.100", "oops", "1:52.900", ""];
    assert_eq!(fastest(laps), Some(112_900));
}

#[test]
fn fastest_of_nothing_is_none() {
    assert_eq!(fastest(Vec::<&str>::new()), None);
    assert_eq!(fastest(["n/a"]), None);
}
