#![no_main]

use arbitrary::Arbitrary;
use gridcast::{Channel, MatchType};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput<'a> {
    listener: &'a str,
    broadcast: &'a str,
    partial: bool,
}

fuzz_target!(|input: FuzzInput<'_>| {
    // Разбор не должен паниковать ни на какой строке.
    let (Ok(listener), Ok(broadcast)) = (
        Channel::new(input.listener),
        Channel::new(input.broadcast),
    ) else {
        return;
    };

    assert_eq!(listener.as_str(), input.listener);
    if let Some(parent) = listener.parent() {
        assert!(listener.is_descendant_or_equal(&parent));
        assert_eq!(parent.depth() + 1, listener.depth());
    }

    let match_type = if input.partial {
        MatchType::Partial
    } else {
        MatchType::Exact
    };
    let matched = broadcast.matches(&listener, match_type);
    if broadcast == listener {
        assert!(matched);
    }
    if matched && !input.partial {
        assert_eq!(broadcast, listener);
    }
});
