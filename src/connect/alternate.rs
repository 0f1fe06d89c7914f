//! Alternate address discovery through the inventory.
//!
//! When the primary target does not accept SSH, the inventory record of the
//! host is consulted for a second address. Candidates are tried in a fixed
//! order and the first usable one wins:
//!
//! 1. The VPN-assigned IP extension attribute
//! 2. The registered FQDN extension attribute
//!
//! Inventory placeholders such as `None` or `0` are never usable addresses;
//! [`is_sentinel`] is the single place that decides this.

use tracing::{debug, info};

use crate::connect::error::InventoryError;
use crate::connect::inventory::Inventory;
use crate::connect::types::InventoryRecord;

/// Placeholder values meaning "no address", compared trimmed and lower-cased.
const SENTINEL_VALUES: &[&str] = &["none", "false", "0", ""];

/// Whether an inventory value is a placeholder rather than an address.
pub fn is_sentinel(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    SENTINEL_VALUES.contains(&normalized.as_str())
}

/// Result of reading one extension attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeLookup {
    Found(String),
    Absent,
}

/// Where an alternate address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlternateSource {
    VpnIp,
    InventoryFqdn,
}

/// A usable alternate address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateHost {
    pub address: String,
    pub source: AlternateSource,
}

/// Outcome of the alternate search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlternateLookup {
    Found(AlternateHost),
    /// The record exists but holds no usable candidate.
    Absent,
    /// The record could not be fetched.
    Failed(InventoryError),
}

/// Read attribute `name` from `record`, dropping placeholder values.
pub fn usable_attribute(record: &InventoryRecord, name: &str) -> AttributeLookup {
    match record.extension_attribute(name) {
        Some(value) if !is_sentinel(value) => AttributeLookup::Found(value.trim().to_string()),
        Some(value) => {
            debug!("Attribute {:?} holds placeholder {:?}", name, value);
            AttributeLookup::Absent
        }
        None => AttributeLookup::Absent,
    }
}

/// Finds alternate addresses for hosts through an [`Inventory`].
pub struct AlternateHostResolver<'a> {
    inventory: &'a dyn Inventory,
    vpn_attribute: Option<String>,
    fqdn_attribute: Option<String>,
}

impl<'a> AlternateHostResolver<'a> {
    /// Create a resolver reading the given attribute names. A `None` or blank
    /// name skips that candidate.
    pub fn new(
        inventory: &'a dyn Inventory,
        vpn_attribute: Option<String>,
        fqdn_attribute: Option<String>,
    ) -> Self {
        let keep = |name: Option<String>| name.filter(|n| !n.trim().is_empty());
        Self {
            inventory,
            vpn_attribute: keep(vpn_attribute),
            fqdn_attribute: keep(fqdn_attribute),
        }
    }

    /// Let the inventory gather what it needs before the first lookup.
    ///
    /// Nothing happens when no candidate attribute is configured.
    pub async fn prepare(&self) -> Result<(), InventoryError> {
        if !self.has_candidates() {
            return Ok(());
        }
        self.inventory.prepare().await
    }

    /// Whether any candidate attribute is configured.
    pub fn has_candidates(&self) -> bool {
        self.vpn_attribute.is_some() || self.fqdn_attribute.is_some()
    }

    /// Look up an alternate address for `host`.
    ///
    /// The record is fetched once and both candidates are read from it.
    pub async fn resolve(&self, host: &str) -> AlternateLookup {
        if !self.has_candidates() {
            return AlternateLookup::Absent;
        }

        let record = match self.inventory.fetch_computer(host).await {
            Ok(record) => record,
            Err(e) => {
                info!("{} lookup for {} failed: {}", self.inventory.name(), host, e);
                return AlternateLookup::Failed(e);
            }
        };

        let candidates = [
            (self.vpn_attribute.as_deref(), AlternateSource::VpnIp),
            (self.fqdn_attribute.as_deref(), AlternateSource::InventoryFqdn),
        ];

        for (attribute, source) in candidates {
            let Some(attribute) = attribute else {
                continue;
            };
            match usable_attribute(&record, attribute) {
                AttributeLookup::Found(address) => {
                    info!("Alternate for {} from {:?}: {}", host, source, address);
                    return AlternateLookup::Found(AlternateHost { address, source });
                }
                AttributeLookup::Absent => {
                    debug!("No usable {:?} for {}", attribute, host);
                }
            }
        }

        AlternateLookup::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::types::ExtensionAttribute;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedInventory {
        result: Result<InventoryRecord, InventoryError>,
        calls: AtomicUsize,
    }

    impl CannedInventory {
        fn with_attrs(attrs: &[(&str, &str)]) -> Self {
            Self {
                result: Ok(InventoryRecord {
                    computer_name: "mac-01".to_string(),
                    extension_attributes: attrs
                        .iter()
                        .map(|(n, v)| ExtensionAttribute {
                            name: n.to_string(),
                            value: v.to_string(),
                        })
                        .collect(),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(error: InventoryError) -> Self {
            Self {
                result: Err(error),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Inventory for CannedInventory {
        async fn fetch_computer(&self, _name: &str) -> Result<InventoryRecord, InventoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        fn name(&self) -> &'static str {
            "canned"
        }
    }

    fn resolver(inventory: &CannedInventory) -> AlternateHostResolver<'_> {
        AlternateHostResolver::new(
            inventory,
            Some("VPN IP".to_string()),
            Some("FQDN".to_string()),
        )
    }

    mod sentinels {
        use super::*;

        #[test]
        fn test_placeholders_are_rejected() {
            for value in ["None", "none", "NONE", "0", "", "false", "False", "  none  ", " "] {
                assert!(is_sentinel(value), "{:?} should be a sentinel", value);
            }
        }

        #[test]
        fn test_addresses_are_accepted() {
            for value in ["10.0.0.5", "192.168.1.50", "mac-01.example.com", "00"] {
                assert!(!is_sentinel(value), "{:?} should be usable", value);
            }
        }
    }

    mod candidate_order {
        use super::*;

        #[tokio::test]
        async fn test_vpn_ip_preferred() {
            let inv = CannedInventory::with_attrs(&[
                ("FQDN", "mac-01.corp.example.com"),
                ("VPN IP", "192.168.1.50"),
            ]);
            let result = resolver(&inv).resolve("mac-01").await;
            assert_eq!(
                result,
                AlternateLookup::Found(AlternateHost {
                    address: "192.168.1.50".to_string(),
                    source: AlternateSource::VpnIp,
                })
            );
            assert_eq!(inv.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_sentinel_vpn_ip_falls_through_to_fqdn() {
            let inv = CannedInventory::with_attrs(&[
                ("VPN IP", "None"),
                ("FQDN", "mac-01.corp.example.com"),
            ]);
            let result = resolver(&inv).resolve("mac-01").await;
            assert_eq!(
                result,
                AlternateLookup::Found(AlternateHost {
                    address: "mac-01.corp.example.com".to_string(),
                    source: AlternateSource::InventoryFqdn,
                })
            );
        }

        #[tokio::test]
        async fn test_no_usable_candidate() {
            let inv = CannedInventory::with_attrs(&[("VPN IP", "0"), ("FQDN", "false")]);
            assert_eq!(resolver(&inv).resolve("mac-01").await, AlternateLookup::Absent);
        }

        #[tokio::test]
        async fn test_attributes_missing() {
            let inv = CannedInventory::with_attrs(&[("Owner", "bob")]);
            assert_eq!(resolver(&inv).resolve("mac-01").await, AlternateLookup::Absent);
        }

        #[tokio::test]
        async fn test_unconfigured_attribute_is_skipped() {
            let inv = CannedInventory::with_attrs(&[("VPN IP", "10.0.0.5"), ("FQDN", "mac-01.lan")]);
            let resolver = AlternateHostResolver::new(&inv, None, Some("FQDN".to_string()));
            assert_eq!(
                resolver.resolve("mac-01").await,
                AlternateLookup::Found(AlternateHost {
                    address: "mac-01.lan".to_string(),
                    source: AlternateSource::InventoryFqdn,
                })
            );
        }

        #[tokio::test]
        async fn test_no_candidates_never_queries() {
            let inv = CannedInventory::with_attrs(&[("VPN IP", "10.0.0.5")]);
            let resolver = AlternateHostResolver::new(&inv, Some("  ".to_string()), None);
            assert!(!resolver.has_candidates());
            assert_eq!(resolver.resolve("mac-01").await, AlternateLookup::Absent);
            assert_eq!(inv.calls.load(Ordering::SeqCst), 0);
        }
    }

    mod failures {
        use super::*;

        #[tokio::test]
        async fn test_lookup_failed_is_reported() {
            let inv = CannedInventory::failing(InventoryError::LookupFailed("boom".to_string()));
            assert_eq!(
                resolver(&inv).resolve("mac-01").await,
                AlternateLookup::Failed(InventoryError::LookupFailed("boom".to_string()))
            );
        }

        #[tokio::test]
        async fn test_not_found_is_reported() {
            let inv = CannedInventory::failing(InventoryError::NotFound("mac-01".to_string()));
            assert!(matches!(
                resolver(&inv).resolve("mac-01").await,
                AlternateLookup::Failed(InventoryError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_prepare_without_candidates_is_a_no_op() {
        let inv = CannedInventory::with_attrs(&[]);
        let resolver = AlternateHostResolver::new(&inv, None, None);
        assert_eq!(resolver.prepare().await, Ok(()));
    }

    #[test]
    fn test_usable_attribute_trims() {
        let rec = InventoryRecord {
            computer_name: "mac-01".to_string(),
            extension_attributes: vec![ExtensionAttribute {
                name: "VPN IP".to_string(),
                value: " 10.0.0.5 ".to_string(),
            }],
        };
        assert_eq!(
            usable_attribute(&rec, "VPN IP"),
            AttributeLookup::Found("10.0.0.5".to_string())
        );
        assert_eq!(usable_attribute(&rec, "FQDN"), AttributeLookup::Absent);
    }
}
