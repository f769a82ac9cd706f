//! Property-based tests for record naming and registration.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use proptest::prelude::*;
use xtrap_rt::info::parse_func_name;
use xtrap_rt::{FuncInfo, InfoRecord, TrapRuntime};

fn ident() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,10}").expect("valid regex")
}

fn pkg_path() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::string::string_regex("[a-z][a-z0-9]{0,6}").expect("valid regex"), 1..4)
        .prop_map(|segments| format!("example.com/{}", segments.join("/")))
}

proptest! {
    #[test]
    fn full_names_parse_back(pkg in pkg_path(), recv in prop::option::of(ident()), ptr in any::<bool>(), name in ident()) {
        let info = match &recv {
            Some(recv) => FuncInfo::method(pkg.clone(), recv.clone(), ptr, name.clone()),
            None => FuncInfo::function(pkg.clone(), name.clone()),
        };
        let full = info.full_name();
        let parsed = parse_func_name(&full).unwrap();
        prop_assert_eq!(parsed.pkg, pkg.as_str());
        prop_assert_eq!(parsed.recv_type, recv.as_deref());
        prop_assert_eq!(parsed.recv_ptr, recv.is_some() && ptr);
        prop_assert_eq!(parsed.name, name.as_str());
    }

    #[test]
    fn registering_twice_matches_registering_once(names in prop::collection::vec(ident(), 0..40)) {
        let once = TrapRuntime::new();
        let twice = TrapRuntime::new();
        let records: Vec<InfoRecord> = names
            .iter()
            .map(|name| InfoRecord::Func(Arc::new(FuncInfo::function("app", name.clone()))))
            .collect();

        for record in &records {
            once.register(record.clone());
        }
        for _ in 0..2 {
            for record in &records {
                twice.register(record.clone());
            }
        }

        let keys = |rt: &TrapRuntime| -> Vec<String> {
            rt.registry().records().iter().map(InfoRecord::full_name).collect()
        };
        prop_assert_eq!(keys(&once), keys(&twice));
    }
}
