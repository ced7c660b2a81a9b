use {
    crate::{AccountRegistry, Effect, SelfKind, StatementCompiler, SyncrError},
    indoc::indoc,
    pretty_assertions::assert_eq,
    serde_json::{json, Value},
};

fn accounts() -> AccountRegistry {
    AccountRegistry::new([("prod", "1"), ("dev", "2"), ("stage", "3")], "prod").unwrap()
}

fn message(e: SyncrError) -> String {
    match e {
        SyncrError::BadPolicy {
            message,
            ..
        } => message,
        other => panic!("Expected BadPolicy, got {:?}", other),
    }
}

fn as_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}

#[test_log::test]
fn test_effect_resolution() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);
    let base = json!({"action": "s3:GetObject", "resource": "*"});

    let e = c.make_permission_statement(&base, None).unwrap_err();
    assert_eq!(message(e), "Need to specify whether we allow this policy or not");

    let s = c.make_permission_statement(&json!({"action": "s3:GetObject", "resource": "*", "allow": false}), None).unwrap();
    assert_eq!(s.effect(), Effect::Deny);

    let s = c.make_permission_statement(&json!({"action": "s3:GetObject", "resource": "*", "Effect": "Deny"}), None).unwrap();
    assert_eq!(s.effect(), Effect::Deny);

    // The caller's category beats anything in the fragment.
    let s = c
        .make_permission_statement(&json!({"action": "s3:GetObject", "resource": "*", "Effect": "Deny", "allow": false}), Some(true))
        .unwrap();
    assert_eq!(s.effect(), Effect::Allow);
    let s = c.make_permission_statement(&base, Some(false)).unwrap();
    assert_eq!(s.effect(), Effect::Deny);

    let e = c.make_permission_statement(&json!({"action": "a", "resource": "*", "allow": "yes"}), None).unwrap_err();
    assert_eq!(message(e), "Need to specify whether we allow this policy or not");

    let e = c.make_permission_statement(&json!({"action": "a", "resource": "*", "Effect": "Maybe"}), None).unwrap_err();
    assert_eq!(message(e), "Invalid effect: Maybe");
}

#[test_log::test]
fn test_missing_action_or_resource() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);

    let e = c.make_permission_statement(&json!({"allow": true}), None).unwrap_err();
    assert_eq!(message(e), "No Resource or NotResource was defined for policy");

    let e = c.make_permission_statement(&json!({"allow": true, "resource": "*"}), None).unwrap_err();
    match e {
        SyncrError::BadPolicy {
            entity,
            message,
            fragment,
        } => {
            assert_eq!(entity, "role=deploy");
            assert_eq!(message, "No Action or NotAction defined for this policy");
            assert_eq!(fragment, Some(json!({"allow": true, "resource": "*"})));
        }
        other => panic!("Unexpected error {:?}", other),
    }

    let s = c.make_permission_statement(&json!({"allow": true, "notaction": "iam:*", "notresource": "*"}), None).unwrap();
    assert_eq!(s.not_action().unwrap(), ["iam:*".to_string()]);
    assert_eq!(s.not_resource().unwrap(), ["*".to_string()]);
    assert!(s.action().is_none());
}

#[test_log::test]
fn test_permission_statement_rendering() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);
    let s = c
        .make_permission_statement(
            &json!({
                "action": ["s3:PutObject", "s3:GetObject"],
                "resource": {"s3": "my-bucket"},
                "Condition": {"Bool": {"aws:SecureTransport": "true"}},
                "Sid": "ReadWrite",
                "Other": "kept",
                "ignored": "lowercase keys are not passed through"
            }),
            Some(true),
        )
        .unwrap();

    assert_eq!(s.overrides().len(), 1);
    assert_eq!(
        c.make_document(vec![s]).unwrap(),
        indoc! {r#"
        {
          "Version": "2012-10-17",
          "Statement": [
            {
              "Sid": "ReadWrite",
              "Effect": "Allow",
              "Action": [
                "s3:GetObject",
                "s3:PutObject"
              ],
              "Resource": [
                "arn:aws:s3:::my-bucket",
                "arn:aws:s3:::my-bucket/*"
              ],
              "Condition": {
                "Bool": {
                  "aws:SecureTransport": "true"
                }
              },
              "Other": "kept"
            }
          ]
        }"#}
    );
}

#[test_log::test]
fn test_raw_and_dsl_keys_combine() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);
    let s = c
        .make_permission_statement(
            &json!({"Action": "sqs:SendMessage", "action": "sqs:ReceiveMessage", "Resource": "*", "allow": true}),
            None,
        )
        .unwrap();
    assert_eq!(s.action().unwrap(), ["sqs:SendMessage".to_string(), "sqs:ReceiveMessage".to_string()]);
    assert_eq!(as_value(&s)["Resource"], json!("*"));
}

#[test_log::test]
fn test_s3_expansion() {
    let accounts = accounts();
    let role = StatementCompiler::new("deploy", SelfKind::Role, &accounts);
    assert_eq!(
        role.resource_expansion(&json!({"s3": "bucket"})).unwrap(),
        vec!["arn:aws:s3:::bucket", "arn:aws:s3:::bucket/*"]
    );
    assert_eq!(role.resource_expansion(&json!({"s3": "bucket/key"})).unwrap(), vec!["arn:aws:s3:::bucket/key"]);
    assert_eq!(
        role.resource_expansion(&json!(["arn:aws:sqs:*", {"s3": ["a", "b/c"]}])).unwrap(),
        vec!["arn:aws:sqs:*", "arn:aws:s3:::a", "arn:aws:s3:::a/*", "arn:aws:s3:::b/c"]
    );

    let e = role.resource_expansion(&json!({"s3": "__self__"})).unwrap_err();
    assert_eq!(message(e), "A role policy has no __self__ bucket");

    let bucket = StatementCompiler::new("my-bucket", SelfKind::Bucket, &accounts);
    assert_eq!(
        bucket.resource_expansion(&json!({"s3": "__self__"})).unwrap(),
        vec!["arn:aws:s3:::my-bucket", "arn:aws:s3:::my-bucket/*"]
    );
}

#[test_log::test]
fn test_resource_errors() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);

    assert_eq!(message(c.resource_expansion(&json!({"ec2": "x"})).unwrap_err()), "Unknown resource type");
    assert_eq!(message(c.resource_expansion(&json!({"s3": "x", "iam": "y"})).unwrap_err()), "Unknown resource type");
    assert_eq!(
        message(c.resource_expansion(&json!(12)).unwrap_err()),
        "Resource should be a string or a dictionary"
    );
    assert_eq!(
        message(c.resource_expansion(&json!([{"s3": "a"}, true])).unwrap_err()),
        "Resource should be a string or a dictionary"
    );
}

#[test_log::test]
fn test_iam_expansion() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);

    assert_eq!(c.iam_arn_expansion(&json!("arn:aws:iam::9:root")).unwrap(), vec!["arn:aws:iam::9:root"]);
    assert_eq!(c.iam_arn_expansion(&json!({"iam": "role/x"})).unwrap(), vec!["arn:aws:iam::1:role/x"]);
    assert_eq!(
        c.iam_arn_expansion(&json!({"iam": "role/x", "account": ["prod", "dev"], "users": ["u1", "u2"]})).unwrap(),
        vec![
            "arn:aws:iam::1:role/x/u1",
            "arn:aws:iam::1:role/x/u2",
            "arn:aws:iam::2:role/x/u1",
            "arn:aws:iam::2:role/x/u2",
        ]
    );
    assert_eq!(
        c.iam_arn_expansion(&json!({"iam": ["assumed-role/admin", "user/bob"], "account": "stage"})).unwrap(),
        vec!["arn:aws:sts::3:assumed-role/admin", "arn:aws:iam::3:user/bob"]
    );
    assert_eq!(c.iam_arn_expansion(&json!({"iam": "role/x", "account": "2"})).unwrap(), vec!["arn:aws:iam::2:role/x"]);

    // __self__ always refers to this role in the account being synced.
    assert_eq!(
        c.iam_arn_expansion(&json!({"iam": "__self__", "account": "dev"})).unwrap(),
        vec!["arn:aws:iam::1:role/deploy"]
    );

    assert_eq!(
        c.iam_arn_expansion(&json!({"iam": ["__self__", "role/x"], "account": ["prod", "dev"]})).unwrap(),
        vec!["arn:aws:iam::1:role/deploy", "arn:aws:iam::1:role/x", "arn:aws:iam::2:role/x"]
    );

    let s = c.expand_trust_statement(&json!({"iam": "__self__", "account": ["prod", "dev"]}), true).unwrap();
    assert_eq!(as_value(&s)["Principal"], json!({"AWS": "arn:aws:iam::1:role/deploy"}));

    let e = c.iam_arn_expansion(&json!({"iam": "role/x", "account": "nope"})).unwrap_err();
    assert_eq!(message(e), "Unknown account specified");

    let bucket = StatementCompiler::new("b", SelfKind::Bucket, &accounts);
    let e = bucket.iam_arn_expansion(&json!({"iam": "__self__"})).unwrap_err();
    assert_eq!(message(e), "Bucket policy has no __self__ iam role");

    assert_eq!(
        c.resource_expansion(&json!({"iam": "role/x", "account": "dev"})).unwrap(),
        vec!["arn:aws:iam::2:role/x"]
    );
}

#[test_log::test]
fn test_kms_expansion() {
    let accounts = accounts();
    let role = StatementCompiler::new("deploy", SelfKind::Role, &accounts);
    let e = role.resource_expansion(&json!({"kms": "secrets"})).unwrap_err();
    assert_eq!(message(e), "No location specified");

    assert_eq!(
        role.resource_expansion(&json!({
            "kms": ["secrets", "alias/other", "1234abcd-12ab-34cd-56ef-1234567890ab"],
            "location": "us-east-1",
            "account": "dev"
        }))
        .unwrap(),
        vec![
            "arn:aws:kms:us-east-1:2:alias/secrets",
            "arn:aws:kms:us-east-1:2:alias/other",
            "arn:aws:kms:us-east-1:2:key/1234abcd-12ab-34cd-56ef-1234567890ab",
        ]
    );

    let e = role.resource_expansion(&json!({"kms": "__self__", "location": "us-east-1"})).unwrap_err();
    assert_eq!(message(e), "A role policy has no __self__ key");

    let key = StatementCompiler::new("secrets", SelfKind::Key, &accounts).with_location(Some("ap-southeast-2"));
    assert_eq!(
        key.resource_expansion(&json!({"kms": ["__self__", "42"]})).unwrap(),
        vec!["arn:aws:kms:ap-southeast-2:1:alias/secrets", "arn:aws:kms:ap-southeast-2:1:key/42"]
    );
    assert_eq!(
        key.resource_expansion(&json!({"kms": ["__self__", "42"], "account": ["prod", "dev"]})).unwrap(),
        vec![
            "arn:aws:kms:ap-southeast-2:1:alias/secrets",
            "arn:aws:kms:ap-southeast-2:1:key/42",
            "arn:aws:kms:ap-southeast-2:2:key/42",
        ]
    );
}

#[test_log::test]
fn test_sns_expansion() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts).with_location(Some("eu-west-1"));
    assert_eq!(
        c.resource_expansion(&json!({"sns": "alerts", "account": ["prod", "dev"]})).unwrap(),
        vec!["arn:aws:sns:eu-west-1:1:alerts", "arn:aws:sns:eu-west-1:2:alerts"]
    );
    assert_eq!(
        c.resource_expansion(&json!({"sns": "alerts", "location": "us-west-2"})).unwrap(),
        vec!["arn:aws:sns:us-west-2:1:alerts"]
    );

    let e = c.resource_expansion(&json!({"sns": "__self__"})).unwrap_err();
    assert_eq!(message(e), "Sns resources have no __self__");
}

#[test_log::test]
fn test_trust_statements() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);

    let s = c.expand_trust_statement(&json!({"service": "ec2"}), true).unwrap();
    assert_eq!(
        as_value(&s),
        json!({
            "Sid": "",
            "Effect": "Allow",
            "Action": "sts:AssumeRole",
            "Principal": {"Service": "ec2.amazonaws.com"}
        })
    );

    let s = c
        .expand_trust_statement(&json!({"iam": "role/ci", "account": ["dev", "stage"], "service": ["lambda.amazonaws.com", "ec2"]}), true)
        .unwrap();
    assert_eq!(
        as_value(&s),
        json!({
            "Sid": "",
            "Effect": "Allow",
            "Action": "sts:AssumeRole",
            "Principal": {
                "AWS": ["arn:aws:iam::2:role/ci", "arn:aws:iam::3:role/ci"],
                "Service": ["ec2.amazonaws.com", "lambda.amazonaws.com"]
            }
        })
    );

    let s = c.expand_trust_statement(&json!({"iam": "role/bad"}), false).unwrap();
    assert!(s.principal().is_none());
    assert_eq!(
        as_value(&s),
        json!({
            "Sid": "",
            "Effect": "Allow",
            "Action": "sts:AssumeRole",
            "NotPrincipal": {"AWS": "arn:aws:iam::1:role/bad"}
        })
    );
}

#[test_log::test]
fn test_federated_trust() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);

    let s = c
        .expand_trust_statement(&json!({"federated": {"iam": "saml-provider/idp", "account": "dev"}}), true)
        .unwrap();
    assert_eq!(s.action().unwrap(), ["sts:AssumeRoleWithSAML".to_string()]);
    assert_eq!(
        as_value(&s)["Principal"],
        json!({"Federated": "arn:aws:iam::2:saml-provider/idp"})
    );

    let s = c
        .expand_trust_statement(
            &json!({"federated": "arn:aws:iam::9:saml-provider/x", "Action": "sts:AssumeRoleWithWebIdentity", "Sid": "web"}),
            true,
        )
        .unwrap();
    assert_eq!(s.action().unwrap(), ["sts:AssumeRoleWithWebIdentity".to_string()]);
    assert_eq!(s.sid(), Some("web"));
}

#[test_log::test]
fn test_trust_with_raw_principal() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);

    let s = c.expand_trust_statement(&json!({"Principal": {"AWS": "arn:aws:iam::9:root"}, "service": "ec2"}), true).unwrap();
    assert_eq!(
        as_value(&s)["Principal"],
        json!({"AWS": "arn:aws:iam::9:root", "Service": "ec2.amazonaws.com"})
    );

    let s = c.expand_trust_statement(&json!({"Principal": "*"}), true).unwrap();
    assert_eq!(as_value(&s)["Principal"], json!("*"));

    let e = c.expand_trust_statement(&json!({"Principal": "*", "service": "ec2"}), true).unwrap_err();
    assert_eq!(message(e), "Can't add principals to a wildcard principal");
}

#[test_log::test]
fn test_fragment_must_be_mapping() {
    let accounts = accounts();
    let c = StatementCompiler::new("deploy", SelfKind::Role, &accounts);
    assert_eq!(message(c.make_permission_statement(&json!("s3:*"), Some(true)).unwrap_err()), "Policy should be a dictionary");
    assert_eq!(message(c.expand_trust_statement(&json!(["x"]), true).unwrap_err()), "Policy should be a dictionary");
    assert_eq!(c.entity(), "role=deploy");
    assert_eq!(c.name(), "deploy");
    assert_eq!(c.self_kind(), SelfKind::Role);
}
