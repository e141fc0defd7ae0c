//! Entity records held by the state store.
//!
//! These are plain data. The store copies and persists them but never
//! interprets their fields; cross-entity references such as
//! [`Instance::image_id`] are not validated.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A record kept in one of the store's collections.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Singular name used in logs and errors ("image", "instance", "volume").
    const KIND: &'static str;

    /// Identifier, unique within the entity's collection.
    fn id(&self) -> &str;
}

/// Infrastructure provider an entity lives on.
///
/// Stored as an upper-case tag. Tags this crate does not know are kept in
/// [`Infrastructure::Other`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Infrastructure {
    Aws,
    Vsphere,
    Virtualbox,
    Qemu,
    Photon,
    Xen,
    Openstack,
    Ukvm,
    Firecracker,
    Gcloud,
    Other(String),
}

impl Infrastructure {
    pub fn as_str(&self) -> &str {
        match self {
            Infrastructure::Aws => "AWS",
            Infrastructure::Vsphere => "VSPHERE",
            Infrastructure::Virtualbox => "VIRTUALBOX",
            Infrastructure::Qemu => "QEMU",
            Infrastructure::Photon => "PHOTON",
            Infrastructure::Xen => "XEN",
            Infrastructure::Openstack => "OPENSTACK",
            Infrastructure::Ukvm => "UKVM",
            Infrastructure::Firecracker => "FIRECRACKER",
            Infrastructure::Gcloud => "GCLOUD",
            Infrastructure::Other(tag) => tag,
        }
    }
}

impl From<String> for Infrastructure {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "AWS" => Infrastructure::Aws,
            "VSPHERE" => Infrastructure::Vsphere,
            "VIRTUALBOX" => Infrastructure::Virtualbox,
            "QEMU" => Infrastructure::Qemu,
            "PHOTON" => Infrastructure::Photon,
            "XEN" => Infrastructure::Xen,
            "OPENSTACK" => Infrastructure::Openstack,
            "UKVM" => Infrastructure::Ukvm,
            "FIRECRACKER" => Infrastructure::Firecracker,
            "GCLOUD" => Infrastructure::Gcloud,
            _ => Infrastructure::Other(tag),
        }
    }
}

impl From<Infrastructure> for String {
    fn from(infrastructure: Infrastructure) -> Self {
        match infrastructure {
            Infrastructure::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Infrastructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where a block device of an image is mounted inside the unikernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceMapping {
    pub mount_point: String,
    pub device_name: String,
}

/// A bootable unikernel image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    pub id: String,
    pub name: String,
    /// Older documents may carry `null` here; it loads as an empty list.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub device_mappings: Vec<DeviceMapping>,
    pub size_mb: i64,
    pub infrastructure: Infrastructure,
    pub created: DateTime<Utc>,
}

impl Entity for Image {
    const KIND: &'static str = "image";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Lifecycle state reported for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    Stopped,
    Pending,
    Paused,
    Suspended,
    Terminated,
    Error,
    Unknown,
}

/// A running (or once-running) instance of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    pub id: String,
    pub image_id: String,
    pub infrastructure: Infrastructure,
    pub name: String,
    pub state: InstanceState,
    pub created: DateTime<Utc>,
}

impl Entity for Instance {
    const KIND: &'static str = "instance";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A data volume, optionally attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub size_mb: i64,
    /// Id of the instance the volume is attached to; empty when detached.
    pub attachment: String,
    pub infrastructure: Infrastructure,
    pub created: DateTime<Utc>,
}

impl Entity for Volume {
    const KIND: &'static str = "volume";

    fn id(&self) -> &str {
        &self.id
    }
}
