use crate::{SetCondition, SetExpiry, SetOptions};
use pretty_assertions::assert_eq;

#[test]
fn test_ttl_args() {
    assert_eq!(SetOptions::Ttl(30).set_args(), vec!["EX", "30"]);
}

#[test]
fn test_extended_args() {
    let options = SetOptions::Extended {
        condition: Some(SetCondition::Xx),
        expiry: Some(SetExpiry::Px(1500)),
    };
    assert_eq!(options.set_args(), vec!["XX", "PX", "1500"]);

    let bare = SetOptions::Extended {
        condition: None,
        expiry: None,
    };
    assert!(bare.set_args().is_empty());
}

#[test]
fn test_builders() {
    assert_eq!(SetOptions::nx().set_args(), vec!["NX"]);
    assert_eq!(
        SetOptions::nx().with_expiry(SetExpiry::Ex(10)).set_args(),
        vec!["NX", "EX", "10"]
    );
    assert_eq!(
        SetOptions::Ttl(5).with_expiry(SetExpiry::Px(20)),
        SetOptions::Extended {
            condition: None,
            expiry: Some(SetExpiry::Px(20)),
        }
    );
    assert_eq!(SetOptions::xx().set_args(), vec!["XX"]);
}
