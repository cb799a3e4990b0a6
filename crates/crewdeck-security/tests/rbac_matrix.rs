#![allow(clippy::unwrap_used, clippy::expect_used)]

use crewdeck_core::{GroupContext, GroupRole};
use crewdeck_security::{authorize, grants_for, Permission, PermissionSet};

#[test]
fn role_matrix() {
    let expected = [
        (GroupRole::Admin, [true, true, true, true]),
        (GroupRole::Manager, [true, true, true, false]),
        (GroupRole::User, [true, false, true, false]),
        (GroupRole::Viewer, [false, false, true, false]),
    ];

    for (role, row) in expected {
        let ctx = GroupContext::new("team-a", role).with_email("someone@example.com");
        for (permission, allowed) in Permission::ALL.into_iter().zip(row) {
            assert_eq!(
                authorize(&ctx, permission).is_ok(),
                allowed,
                "{role} / {permission}"
            );
        }
    }
}

#[test]
fn permission_set_serializes_as_snake_case() {
    let set: PermissionSet = [Permission::ManageMembers].into_iter().collect();
    let json = serde_json::to_string(&set).unwrap();
    assert!(json.contains("manage_members"));

    let back: PermissionSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);
}

#[test]
fn role_parsed_from_cli_flag_drives_grants() {
    let role: GroupRole = "Manager".parse().unwrap();
    assert!(grants_for(role).has(&Permission::ManageCrews));
}
