use dids_core::{DID, DIDURL};

const DIDS: [&str; 8] = [
    "did:example:123456789abcdefghi",
    "did:web:w3c-ccg.github.io:user:alice",
    "did:web:example.com%3A8443",
    "did:example:escaped%F0%9F%A4%96",
    "did:example:%65scaped%f0%9f%a4%96",
    "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK",
    "did:ion:EiClkZMDxPKqC9c-umQfTkR8vvZ9JPhl_xLDI9Nfk38w5w",
    "did:a1:._-",
];

#[test]
fn round_trip_idempotence() {
    for s in DIDS {
        let did = DID::parse(s).unwrap();
        let canonical = did.to_string();
        assert_eq!(DID::parse(&canonical).unwrap(), did, "{s}");
        assert_eq!(DID::parse(&canonical).unwrap().to_string(), canonical);
    }
}

#[test]
fn reflexive_and_symmetric() {
    for a in DIDS {
        assert!(DID::parse(a).unwrap().equal_str(a), "{a}");

        for b in DIDS {
            if DID::parse(a).unwrap().equal_str(b) {
                assert!(DID::parse(b).unwrap().equal_str(a), "{a} vs {b}");
            }
        }
    }
}

#[test]
fn percent_encoding_case_insensitive() {
    let variants = [
        "did:example:escaped%F0%9F%A4%96",
        "did:example:%65scaped%F0%9F%A4%96",
        "did:example:escap%65d%F0%9F%A4%96",
        "did:example:escaped%f0%9f%a4%96",
    ];

    for a in variants {
        for b in variants {
            assert!(DID::parse(a).unwrap().equal_str(b), "{a} vs {b}");
            assert!(DIDURL::parse(a).unwrap().equal_str(b), "{a} vs {b}");
        }
    }

    assert!(!DID::parse(variants[0]).unwrap().equal_str("did:example:escaped"));
    assert!(!DID::parse(variants[0]).unwrap().equal_str("did:EXAMPLE:escaped%F0%9F%A4%96"));
}

#[test]
fn colon_escape_equivalence() {
    let did = DID::parse("did:web:example.com:8443").unwrap();
    assert_eq!(did.to_string(), "did:web:example.com%3A8443");
    assert!(did.equal_str("did:web:example.com%3a8443"));
}

#[test]
fn query_order_sensitive() {
    let url = DIDURL::parse("did:example:1?a=1&a=2").unwrap();
    assert!(url.equal_str("did:example:1?a=%31&a=2"));
    assert!(!url.equal_str("did:example:1?a=2&a=1"));
}

#[test]
fn url_equivalence() {
    let equal = [
        ("did:example:1/a/./b#f", "did:example:1/a/b#f"),
        ("did:example:1/%7Euser", "did:example:1/~user"),
        ("did:example:%31/p?q#%66", "did:example:1/p?q#f"),
        ("did:example:1#key-1", "did:example:1#key%2d1"),
    ];
    for (a, b) in equal {
        assert!(DIDURL::parse(a).unwrap().equal_str(b), "{a} vs {b}");
        assert!(DIDURL::parse(b).unwrap().equal_str(a), "{b} vs {a}");
    }

    let unequal = [
        ("did:example:1", "did:example:1/"),
        ("did:example:1", "did:example:1?"),
        ("did:example:1", "did:example:1#"),
        ("did:example:1/a/b", "did:example:1/a%2Fb"),
        ("did:example:1#f", "did:example:2#f"),
        ("did:example:1#f", "did:other:1#f"),
    ];
    for (a, b) in unequal {
        assert!(!DIDURL::parse(a).unwrap().equal_str(b), "{a} vs {b}");
        assert!(!DIDURL::parse(b).unwrap().equal_str(a), "{b} vs {a}");
    }
}

#[test]
fn relative_never_equal() {
    let relative = DIDURL::parse("#key-1").unwrap();
    assert!(relative.is_relative());
    assert!(!relative.equal(&relative));
    assert!(!relative.equal_str("#key-1"));

    let base = DID::parse("did:example:1").unwrap();
    assert!(relative.resolve(&base).equal_str("did:example:1#key-1"));
}

#[test]
fn encoded_dot_segments() {
    let base = DID::parse("did:example:1").unwrap();
    let relative = DIDURL::parse("/a/%2E%2E/b/%2e/c").unwrap();

    let resolved = relative.resolve(&base);
    assert_eq!(resolved.to_string(), "did:example:1/b/c");
    assert!(resolved.equal_str("did:example:1/a/%2E%2E/b/%2e/c"));
}

#[test]
fn path_segment_round_trip() {
    let vectors: [&[&str]; 5] = [
        &["", "a/b", "x"],
        &["a"],
        &["%", "?", "#"],
        &["", ""],
        &["ü", "..", "."],
    ];

    for segments in vectors {
        let mut url = DIDURL::from(DID::parse("did:example:1").unwrap());
        url.set_path_segments(segments);

        let reparsed = DIDURL::parse(&url.to_string()).unwrap();
        let decoded = reparsed.path_segments();
        let got: Vec<&[u8]> = decoded.iter().map(|s| s.as_ref()).collect();
        let want: Vec<&[u8]> = segments.iter().map(|s| s.as_bytes()).collect();
        assert_eq!(got, want, "{url}");
    }
}

#[test]
fn syntax_rejection_with_location() {
    let err = DID::parse("did:").unwrap_err();
    assert_eq!(err.offset(), 4);
    assert!(err.is_incomplete());
    assert_eq!(err.to_string(), "incomplete DID");

    let err = DID::parse("did::bar").unwrap_err();
    assert_eq!(err.offset(), 4);
    assert_eq!(err.to_string(), "illegal character ':' at DID byte offset 4");

    let err = DID::parse("urn:isbn:0451450523").unwrap_err();
    assert!(err.cause().is_some());
    assert_eq!(err.to_string(), "invalid DID: not a DID");
}
