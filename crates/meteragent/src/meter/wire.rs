//! P4Runtime meter messages.
//!
//! Field numbers follow `p4.v1.MeterEntry`, `p4.v1.Index` and
//! `p4.v1.MeterConfig`. `config` is a message field, so its presence is
//! carried on the wire separately from the values inside it: an entry
//! without config is a cell in its default state, while a config whose
//! fields are all zero is a real zero-rate configuration.

/// Index of a cell within a meter array.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Index {
    #[prost(int64, tag = "1")]
    pub index: i64,
}

/// Two-rate meter configuration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct MeterConfig {
    /// Committed information rate.
    #[prost(int64, tag = "1")]
    pub cir: i64,
    /// Committed burst size.
    #[prost(int64, tag = "2")]
    pub cburst: i64,
    /// Peak information rate.
    #[prost(int64, tag = "3")]
    pub pir: i64,
    /// Peak burst size.
    #[prost(int64, tag = "4")]
    pub pburst: i64,
}

/// One meter cell as exchanged with the device.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct MeterEntry {
    #[prost(uint32, tag = "1")]
    pub meter_id: u32,
    #[prost(message, optional, tag = "2")]
    pub index: Option<Index>,
    #[prost(message, optional, tag = "3")]
    pub config: Option<MeterConfig>,
}
