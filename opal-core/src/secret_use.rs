//! The plan-attached record of an authorized secret use.

use crate::id::{DisplayId, SiteId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One authorized (display_id, site) pair attached to a plan.
///
/// Serialized into the plan as canonical JSON; field declaration order
/// is alphabetical so the struct serializer and a canonical-JSON pass
/// agree byte for byte. The plan is hashed with the full sorted list
/// included, which is what makes execution integrity verifiable against
/// the declared authorities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretUse {
    /// Placeholder for the secret value.
    pub display_id: DisplayId,
    /// Canonical site path, e.g. `root/step-1/@shell[0]/params/command`.
    pub site: String,
    /// Keyed hash of the site path.
    pub site_id: SiteId,
}

impl Ord for SecretUse {
    fn cmp(&self, other: &Self) -> Ordering {
        self.display_id
            .cmp(&other.display_id)
            .then_with(|| self.site.cmp(&other.site))
    }
}

impl PartialOrd for SecretUse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_use(display_id: &str, site: &str) -> SecretUse {
        SecretUse {
            display_id: DisplayId::new(display_id),
            site: site.to_owned(),
            site_id: SiteId::new("s"),
        }
    }

    #[test]
    fn orders_by_display_id_then_site() {
        let mut uses = vec![
            secret_use("opal:b", "root/step-1/@shell[0]/params/command"),
            secret_use("opal:a", "root/step-2/@shell[0]/params/command"),
            secret_use("opal:a", "root/step-1/@shell[0]/params/command"),
        ];
        uses.sort();
        assert_eq!(uses[0].display_id.as_str(), "opal:a");
        assert!(uses[0].site < uses[1].site);
        assert_eq!(uses[2].display_id.as_str(), "opal:b");
    }

    #[test]
    fn serializes_with_sorted_keys() {
        let u = secret_use("opal:x", "root/params/p");
        let json = serde_json::to_string(&u).unwrap();
        assert_eq!(
            json,
            r#"{"display_id":"opal:x","site":"root/params/p","site_id":"s"}"#
        );
    }
}
