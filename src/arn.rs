use std::fmt::{Display, Formatter, Result as FmtResult};

const PARTITION_START: usize = 4;

/// The partition every ARN synthesized by this crate lives in.
pub const AWS_PARTITION: &str = "aws";

/// An Amazon Resource Name assembled from its components.
///
/// IAM and STS ARNs have no region (`arn:aws:iam::123456789012:role/x`) and S3 ARNs have neither region nor account
/// (`arn:aws:s3:::bucket`); empty components are kept as empty segments.
///
/// [Arn] objects are immutable.
#[derive(Debug, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Arn {
    arn: String,
    service_start: usize,
    region_start: usize,
    account_id_start: usize,
    resource_start: usize,
}

impl Arn {
    /// Create a new ARN from the specified components.
    ///
    /// * `partition` - The partition the resource is in.
    /// * `service` - The service the resource belongs to.
    /// * `region` - The region the resource is in.
    /// * `account_id` - The account ID the resource belongs to.
    /// * `resource` - The resource name.
    pub fn new(partition: &str, service: &str, region: &str, account_id: &str, resource: &str) -> Self {
        let arn = format!("arn:{partition}:{service}:{region}:{account_id}:{resource}");
        let service_start = PARTITION_START + partition.len() + 1;
        let region_start = service_start + service.len() + 1;
        let account_id_start = region_start + region.len() + 1;
        let resource_start = account_id_start + account_id.len() + 1;

        Self {
            arn,
            service_start,
            region_start,
            account_id_start,
            resource_start,
        }
    }

    /// An IAM (or, for `assumed-role/...` paths, STS) ARN in the given account.
    pub fn iam(account_id: &str, path: &str) -> Self {
        let service = if path.starts_with("assumed-role") {
            "sts"
        } else {
            "iam"
        };
        Self::new(AWS_PARTITION, service, "", account_id, path)
    }

    /// An S3 ARN for a bucket or a `bucket/key` path.
    pub fn s3(bucket_key: &str) -> Self {
        Self::new(AWS_PARTITION, "s3", "", "", bucket_key)
    }

    #[inline]
    pub fn partition(&self) -> &str {
        &self.arn[PARTITION_START..self.service_start - 1]
    }

    #[inline]
    pub fn service(&self) -> &str {
        &self.arn[self.service_start..self.region_start - 1]
    }

    #[inline]
    pub fn region(&self) -> &str {
        &self.arn[self.region_start..self.account_id_start - 1]
    }

    #[inline]
    pub fn account_id(&self) -> &str {
        &self.arn[self.account_id_start..self.resource_start - 1]
    }

    #[inline]
    pub fn resource(&self) -> &str {
        &self.arn[self.resource_start..]
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.arn
    }

    /// A new ARN with `/suffix` appended to the resource.
    pub fn child(&self, suffix: &str) -> Self {
        Self::new(
            self.partition(),
            self.service(),
            self.region(),
            self.account_id(),
            &format!("{}/{}", self.resource(), suffix),
        )
    }
}

impl Display for Arn {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&self.arn)
    }
}

impl From<Arn> for String {
    fn from(arn: Arn) -> Self {
        arn.arn
    }
}

#[cfg(test)]
mod tests {
    use {super::Arn, pretty_assertions::assert_eq};

    #[test_log::test]
    fn check_components() {
        let arn = Arn::new("aws", "kms", "us-east-1", "123456789012", "alias/thing");
        assert_eq!(arn.partition(), "aws");
        assert_eq!(arn.service(), "kms");
        assert_eq!(arn.region(), "us-east-1");
        assert_eq!(arn.account_id(), "123456789012");
        assert_eq!(arn.resource(), "alias/thing");
        assert_eq!(arn.to_string(), "arn:aws:kms:us-east-1:123456789012:alias/thing");
    }

    #[test_log::test]
    fn check_shortcuts() {
        assert_eq!(Arn::iam("123", "role/x").as_str(), "arn:aws:iam::123:role/x");
        assert_eq!(Arn::iam("123", "assumed-role/x").as_str(), "arn:aws:sts::123:assumed-role/x");
        assert_eq!(Arn::s3("bucket").as_str(), "arn:aws:s3:::bucket");
        assert_eq!(Arn::s3("bucket").region(), "");
        assert_eq!(Arn::s3("bucket").account_id(), "");
        assert_eq!(Arn::s3("bucket").resource(), "bucket");
        assert_eq!(Arn::iam("123", "role/x").child("u1").as_str(), "arn:aws:iam::123:role/x/u1");
        assert_eq!(String::from(Arn::s3("b/k")), "arn:aws:s3:::b/k");
    }
}
