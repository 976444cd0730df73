//! Shared fixtures for the walker and file store tests.
//!
//! A small user-management model: a manager holding users, each user owning
//! request, history and options records with enums, dates, lists and an
//! optional nested object.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;
use xmlbind::{AccessError, Member, Method, TypeDescriptor, XmlObject, xml_enum, xml_object};

xml_enum! {
    pub enum DataType { TypeA, TypeB, TypeC, TypeD }
}

xml_enum! {
    pub enum EquipmentType { Development, Operator, PowerUser, User }
}

xml_enum! {
    pub enum ProgressStatus { NotStarted, InProgress, Completed }
}

/// Root of the model. Written as `<UserManagerABC>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestManager {
    pub user_list: Vec<TestUser>,
    pub updated_date: DateTime<Utc>,
}

impl Default for TestManager {
    fn default() -> Self {
        Self {
            user_list: Vec::new(),
            updated_date: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl XmlObject for TestManager {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("TestManager")
            .root_name("UserManagerABC")
            .member(Member::field(
                "UserList",
                |m: &Self| &m.user_list,
                |m, v| m.user_list = v,
            ))
            .member(
                Member::field(
                    "UpdatedDate",
                    |m: &Self| &m.updated_date,
                    |m, v| m.updated_date = v,
                )
                .ignore(),
            )
            .method(Method::action_with(
                "SetUpdatedAt",
                |m: &mut Self, date: DateTime<Utc>| m.updated_date = date,
            ))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestUser {
    pub constract_pattern: i32,
    pub constract_id: i32,
    pub constract_type: DataType,
    pub user_request: TestUserRequest,
    pub user_history: TestUserHistory,
    pub user_options: TestUserOptions,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            constract_pattern: 1,
            constract_id: -1,
            constract_type: DataType::TypeA,
            user_request: TestUserRequest::default(),
            user_history: TestUserHistory::default(),
            user_options: TestUserOptions::default(),
        }
    }
}

impl TestUser {
    pub fn new(id: i32, constract_type: DataType) -> Self {
        Self {
            constract_pattern: 2,
            constract_id: id,
            constract_type,
            ..Default::default()
        }
    }
}

impl XmlObject for TestUser {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("TestUser")
            .member(Member::field(
                "ConstractPattern",
                |u: &Self| &u.constract_pattern,
                |u, v| u.constract_pattern = v,
            ))
            .member(
                Member::field("ConstractId", |u: &Self| &u.constract_id, |u, v| u.constract_id = v)
                    .attribute_named("Id"),
            )
            .member(Member::field(
                "ConstractType",
                |u: &Self| &u.constract_type,
                |u, v| u.constract_type = v,
            ))
            .member(Member::field(
                "UserRequest",
                |u: &Self| &u.user_request,
                |u, v| u.user_request = v,
            ))
            .member(Member::field(
                "UserHistory",
                |u: &Self| &u.user_history,
                |u, v| u.user_history = v,
            ))
            .member(Member::field(
                "UserOptions",
                |u: &Self| &u.user_options,
                |u, v| u.user_options = v,
            ))
            .method(Method::function_with("SetTypeId", |u: &mut Self, id: i32| {
                u.constract_pattern = 3;
                u.constract_id = id;
                u.constract_id
            }))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestUserRequest {
    pub user_account_type: EquipmentType,
    pub authalization_try_count: i32,
    pub password: i32,
}

impl Default for TestUserRequest {
    fn default() -> Self {
        Self {
            user_account_type: EquipmentType::Development,
            authalization_try_count: 1,
            password: 0,
        }
    }
}

impl XmlObject for TestUserRequest {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("TestUserRequest")
            .member(Member::field(
                "UserAccountType",
                |r: &Self| &r.user_account_type,
                |r, v| r.user_account_type = v,
            ))
            .member(Member::field(
                "AuthalizationTryCount",
                |r: &Self| &r.authalization_try_count,
                |r, v| r.authalization_try_count = v,
            ))
            .member(Member::field("Password", |r: &Self| &r.password, |r, v| r.password = v))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestUserHistory {
    pub equip_status: EquipmentType,
    pub equip_status_before: EquipmentType,
    pub login_time: DateTime<Utc>,
    pub logout_time: DateTime<Utc>,
    pub is_login: bool,
}

impl Default for TestUserHistory {
    fn default() -> Self {
        Self {
            equip_status: EquipmentType::Operator,
            equip_status_before: EquipmentType::PowerUser,
            login_time: DateTime::<Utc>::UNIX_EPOCH,
            logout_time: DateTime::<Utc>::UNIX_EPOCH,
            is_login: false,
        }
    }
}

impl XmlObject for TestUserHistory {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("TestUserHistory")
            .member(Member::field(
                "EquipStatus",
                |h: &Self| &h.equip_status,
                |h, v| h.equip_status = v,
            ))
            .member(Member::field(
                "EquipStatusBefore",
                |h: &Self| &h.equip_status_before,
                |h, v| h.equip_status_before = v,
            ))
            .member(Member::field("LoginTime", |h: &Self| &h.login_time, |h, v| h.login_time = v))
            .member(Member::field(
                "LogoutTime",
                |h: &Self| &h.logout_time,
                |h, v| h.logout_time = v,
            ))
            .member(Member::field("IsLogin", |h: &Self| &h.is_login, |h, v| h.is_login = v).attribute())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestUserOptions {
    pub operator_call: bool,
    pub operation_status: i32,
    pub friend_account_no_list: Vec<i32>,
    pub block_account_no_list: Vec<i32>,
    pub options_add: Option<TestUserOptionsAdd>,
}

impl XmlObject for TestUserOptions {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("TestUserOptions")
            .member(Member::field(
                "OperatorCall",
                |o: &Self| &o.operator_call,
                |o, v| o.operator_call = v,
            ))
            .member(Member::field(
                "OperationStatus",
                |o: &Self| &o.operation_status,
                |o, v| o.operation_status = v,
            ))
            .member(
                Member::field(
                    "FriendAccountNoList",
                    |o: &Self| &o.friend_account_no_list,
                    |o, v| o.friend_account_no_list = v,
                )
                .item_name("AccountNo"),
            )
            .member(Member::field(
                "BlockAccountNoList",
                |o: &Self| &o.block_account_no_list,
                |o, v| o.block_account_no_list = v,
            ))
            .member(Member::field(
                "OptionsAdd",
                |o: &Self| &o.options_add,
                |o, v| o.options_add = v,
            ))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestUserOptionsAdd {
    pub user_account_no: i32,
    pub nortice_message: String,
    pub send_device_id: ProgressStatus,
}

impl Default for TestUserOptionsAdd {
    fn default() -> Self {
        Self {
            user_account_no: 1234,
            nortice_message: "initialized.".to_string(),
            send_device_id: ProgressStatus::NotStarted,
        }
    }
}

impl XmlObject for TestUserOptionsAdd {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("TestUserOptionsAdd")
            .member(Member::field(
                "UserAccountNo",
                |a: &Self| &a.user_account_no,
                |a, v| a.user_account_no = v,
            ))
            .member(
                Member::field(
                    "NorticeMessage",
                    |a: &Self| &a.nortice_message,
                    |a, v| a.nortice_message = v,
                )
                .element_named("Notice"),
            )
            .member(Member::field(
                "SendDeviceId",
                |a: &Self| &a.send_device_id,
                |a, v| a.send_device_id = v,
            ))
            .build()
    }
}

/// Text-bound content next to an attribute, plus a member whose getter fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Memo {
    pub author: String,
    pub body: String,
    pub priority: i32,
    pub fail_checksum: bool,
}

impl XmlObject for Memo {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("Memo")
            .member(Member::field("Body", |m: &Self| &m.body, |m, v| m.body = v).text())
            .member(Member::field("Author", |m: &Self| &m.author, |m, v| m.author = v).attribute())
            .member(Member::computed("Checksum", |m: &Self| {
                if m.fail_checksum {
                    Err(AccessError::failed("checksum unavailable"))
                } else {
                    Ok(m.body.len() as i32)
                }
            }))
            .member(Member::field("Priority", |m: &Self| &m.priority, |m, v| m.priority = v))
            .build()
    }
}

/// Bare list of integers with a fixed item name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Numbers {
    pub values: Vec<i32>,
    pub label: Option<String>,
}

impl XmlObject for Numbers {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("Numbers")
            .member(Member::field("Values", |n: &Self| &n.values, |n, v| n.values = v).item_name("Item"))
            .member(Member::field("Label", |n: &Self| &n.label, |n, v| n.label = v))
            .build()
    }
}

/// Single-character member whose default has no XML representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Badge {
    pub initial: char,
    pub caption: String,
}

impl XmlObject for Badge {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>("Badge")
            .member(Member::field("Initial", |b: &Self| &b.initial, |b, v| b.initial = v))
            .member(Member::field("Caption", |b: &Self| &b.caption, |b, v| b.caption = v))
            .build()
    }
}

xml_object!(
    TestManager,
    TestUser,
    TestUserRequest,
    TestUserHistory,
    TestUserOptions,
    TestUserOptionsAdd,
    Memo,
    Numbers,
    Badge,
);

/// Routes library logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A manager with two users exercising every member kind.
pub fn sample_manager() -> TestManager {
    let mut alice = TestUser::new(10, DataType::TypeB);
    alice.user_request.user_account_type = EquipmentType::PowerUser;
    alice.user_request.password = 4711;
    alice.user_history.login_time = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
    alice.user_history.is_login = true;
    alice.user_options.operator_call = true;
    alice.user_options.friend_account_no_list = vec![1, 2, 3];
    alice.user_options.options_add = Some(TestUserOptionsAdd {
        user_account_no: 99,
        nortice_message: "line one\nline <two> & \"three\"".to_string(),
        send_device_id: ProgressStatus::InProgress,
    });

    let mut bob = TestUser::new(11, DataType::TypeD);
    bob.user_options.block_account_no_list = vec![7];

    TestManager {
        user_list: vec![alice, bob],
        ..Default::default()
    }
}
