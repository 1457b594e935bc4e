use super::*;

#[test]
fn test_generated_names_are_unique() {
    let mut stack = SavepointStack::new();
    let root = stack.reserve_name(None).unwrap();
    stack.push(root.clone());
    let child = stack.reserve_name(None).unwrap();

    assert!(root.starts_with("sandbox_root_"));
    assert!(child.starts_with("sandbox_sp_"));
    assert_ne!(root, child);
}

#[test]
fn test_depth_tracks_position() {
    let mut stack = SavepointStack::new();
    for name in ["root", "test_a", "step_two"] {
        let name = stack.reserve_name(Some(name)).unwrap();
        stack.push(name);
    }

    assert_eq!(stack.root().unwrap().depth, 0);
    assert_eq!(stack.find("step_two").unwrap().depth, 2);
    assert_eq!(stack.top().unwrap().name, "step_two");
}

#[test]
fn test_duplicate_name_rejected() {
    let mut stack = SavepointStack::new();
    stack.push("checkpoint".to_string());
    assert!(matches!(
        stack.reserve_name(Some("checkpoint")),
        Err(TransactionError::DuplicateSavepoint { .. })
    ));
}

#[test]
fn test_invalid_names_rejected() {
    let mut stack = SavepointStack::new();
    let too_long = "x".repeat(65);
    for bad in ["", "1abc", "drop table; --", "with space", too_long.as_str()] {
        assert!(
            matches!(
                stack.reserve_name(Some(bad)),
                Err(TransactionError::InvalidSavepointName { .. })
            ),
            "accepted {bad:?}"
        );
    }
    assert!(stack.reserve_name(Some("_state_before_step_2")).is_ok());
}

#[test]
fn test_truncate_above_keeps_target() {
    let mut stack = SavepointStack::new();
    for name in ["a", "b", "c", "d"] {
        stack.push(name.to_string());
    }

    assert_eq!(stack.truncate_above(1), 2);
    assert_eq!(stack.len(), 2);
    assert_eq!(stack.top().unwrap().name, "b");
    assert_eq!(stack.truncate_above(1), 0);
}

#[test]
fn test_generated_name_skips_caller_collisions() {
    let mut stack = SavepointStack::new();
    stack.push("root".to_string());
    stack.push("sandbox_sp_1".to_string());
    let generated = stack.reserve_name(None).unwrap();
    assert_eq!(generated, "sandbox_sp_2");
}
