//! Field dictionary configuration.
//!
//! The ISO 8583 codec is driven entirely by data: an ordered map from bit
//! number to a field descriptor. [`default_bit_config`] ships the Mastercard
//! IPM dictionary; callers with scheme variations can build their own map
//! with the same descriptors.

use std::collections::BTreeMap;

/// Default date pattern for datetime-typed fields.
pub const DEFAULT_DATE_FORMAT: &str = "%y%m%d";

/// Default regex used by the DE43 processor when no per-field regex is
/// configured. Splits the merchant name/location composite into the six
/// named groups consumed downstream.
pub const DEFAULT_DE43_REGEX: &str = r"(?P<DE43_NAME>.+?) *\\(?P<DE43_ADDRESS>.+?) *\\(?P<DE43_SUBURB>.+?) *\\(?P<DE43_POSTCODE>\S{4,10}) *(?P<DE43_STATE>.{3})(?P<DE43_COUNTRY>.{3})";

/// ISO 8583 field layout on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Fixed width, no length prefix.
    Fixed,
    /// Variable width with a 2-digit decimal length prefix.
    LlVar,
    /// Variable width with a 3-digit decimal length prefix.
    LllVar,
}

impl FieldType {
    /// Number of decimal digits in the length prefix.
    pub fn length_prefix_digits(&self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::LlVar => 2,
            Self::LllVar => 3,
        }
    }
}

/// Scheme-specific treatment applied to a field after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProcessor {
    /// Mask a card number: first 6, stars, last 4.
    Pan,
    /// Truncate a card number to its 9-digit prefix.
    PanPrefix,
    /// Mastercard private data subelements; expands `PDSxxxx` keys.
    Pds,
    /// EMV chip data; expands `TAGxx` keys and `ICC_DATA`.
    Icc,
    /// Merchant name/location composite; expands `DE43_*` keys.
    De43,
}

/// Native type a decoded field value is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Plain text, the default.
    #[default]
    Text,
    /// Signed integer.
    Int,
    /// Fixed-point decimal, precision preserved.
    Decimal,
    /// Date/time parsed with the field's date format.
    Date,
}

/// Configuration for a single bitmap position.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Descriptive field name; documentation only.
    pub name: String,
    /// Wire layout of the field.
    pub field_type: FieldType,
    /// Width for fixed fields; soft maximum for variable fields (0 means
    /// unlimited).
    pub length: usize,
    /// Optional scheme-specific processor.
    pub processor: Option<FieldProcessor>,
    /// Processor parameters: a regex for DE43, `on_error=...` for ICC.
    pub processor_config: Option<String>,
    /// Native type of the decoded value.
    pub value_type: ValueType,
    /// strftime-style pattern for datetime fields.
    pub date_format: Option<String>,
}

impl FieldConfig {
    /// Create a descriptor with the given name, layout and length.
    pub fn new(name: impl Into<String>, field_type: FieldType, length: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
            processor: None,
            processor_config: None,
            value_type: ValueType::Text,
            date_format: None,
        }
    }

    /// Attach a field processor.
    pub fn with_processor(mut self, processor: FieldProcessor) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Attach processor parameters.
    pub fn with_processor_config(mut self, config: impl Into<String>) -> Self {
        self.processor_config = Some(config.into());
        self
    }

    /// Set the native value type.
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Set the date pattern for datetime fields.
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// The date pattern in effect for this field.
    pub fn date_format(&self) -> &str {
        self.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }
}

/// Bit configuration: field descriptors keyed by bit number, iterated in
/// ascending bit order.
pub type BitConfig = BTreeMap<u8, FieldConfig>;

/// A half-open character span within a fixed-layout parameter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub start: usize,
    pub end: usize,
}

impl FieldSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Field spans for one parameter table, keyed by output field name.
pub type TableLayout = BTreeMap<String, FieldSpan>;

/// Parameter table layouts keyed by table id.
pub type ParamTables = BTreeMap<String, TableLayout>;

/// Dictionary keys, in order, for projecting records to flat output such as
/// CSV. Consumed by external tooling; unused inside the codec.
pub const OUTPUT_DATA_ELEMENTS: &[&str] = &[
    "MTI", "DE2", "DE3", "DE4", "DE12", "DE14", "DE22", "DE23", "DE24", "DE25", "DE26", "DE30",
    "DE31", "DE33", "DE37", "DE38", "DE40", "DE41", "DE42", "DE48", "DE49", "DE50", "DE63",
    "DE71", "DE73", "DE93", "DE94", "DE95", "DE100", "PDS0023", "PDS0052", "PDS0122", "PDS0148",
    "PDS0158", "PDS0165", "DE43_NAME", "DE43_SUBURB", "DE43_POSTCODE", "ICC_DATA",
];

/// The Mastercard IPM bit configuration.
pub fn default_bit_config() -> BitConfig {
    use FieldProcessor::*;
    use FieldType::*;
    use ValueType::*;

    let mut config = BitConfig::new();
    let mut add = |bit: u8, field: FieldConfig| {
        config.insert(bit, field);
    };

    add(1, FieldConfig::new("Bitmap secondary", Fixed, 8));
    add(2, FieldConfig::new("PAN", LlVar, 0));
    add(3, FieldConfig::new("Processing code", Fixed, 6));
    add(4, FieldConfig::new("Amount transaction", Fixed, 12).with_value_type(Int));
    add(5, FieldConfig::new("Amount, Reconciliation", Fixed, 12).with_value_type(Int));
    add(6, FieldConfig::new("Amount, Cardholder billing", Fixed, 12).with_value_type(Int));
    add(9, FieldConfig::new("Conversion rate, Reconciliation", Fixed, 8).with_value_type(Int));
    add(
        10,
        FieldConfig::new("Conversion rate, Cardholder billing", Fixed, 8).with_value_type(Int),
    );
    add(
        12,
        FieldConfig::new("Date/Time local transaction", Fixed, 12)
            .with_value_type(Date)
            .with_date_format("%y%m%d%H%M%S"),
    );
    add(14, FieldConfig::new("Expiration date", Fixed, 4));
    add(22, FieldConfig::new("Point of service data code", Fixed, 12));
    add(23, FieldConfig::new("Card sequence number", Fixed, 3));
    add(24, FieldConfig::new("Function code", Fixed, 3));
    add(25, FieldConfig::new("Message reason code", Fixed, 4));
    add(
        26,
        FieldConfig::new("Card acceptor business code", Fixed, 4).with_value_type(Int),
    );
    add(30, FieldConfig::new("Amounts, original", Fixed, 24));
    add(31, FieldConfig::new("Acquirer reference data", LlVar, 23));
    add(32, FieldConfig::new("Acquiring institution ID code", LlVar, 0));
    add(33, FieldConfig::new("Forwarding institution ID code", LlVar, 0));
    add(37, FieldConfig::new("Retrieval reference number", Fixed, 12));
    add(38, FieldConfig::new("Approval code", Fixed, 6));
    add(40, FieldConfig::new("Service code", Fixed, 3));
    add(41, FieldConfig::new("Card acceptor terminal ID", Fixed, 8));
    add(42, FieldConfig::new("Card acceptor Id", Fixed, 15));
    add(
        43,
        FieldConfig::new("Card acceptor name/location", LlVar, 0)
            .with_processor(De43)
            .with_processor_config(DEFAULT_DE43_REGEX),
    );
    add(48, FieldConfig::new("Additional data", LllVar, 0).with_processor(Pds));
    add(49, FieldConfig::new("Currency code, Transaction", Fixed, 3));
    add(50, FieldConfig::new("Currency code, Reconciliation", Fixed, 3));
    add(51, FieldConfig::new("Currency code, Cardholder billing", Fixed, 3));
    add(54, FieldConfig::new("Amounts, additional", LllVar, 0));
    add(
        55,
        FieldConfig::new("ICC system related data", LllVar, 255).with_processor(Icc),
    );
    add(62, FieldConfig::new("Additional data 2", LllVar, 0).with_processor(Pds));
    add(63, FieldConfig::new("Transaction lifecycle Id", LllVar, 16));
    add(71, FieldConfig::new("Message number", Fixed, 8).with_value_type(Int));
    add(72, FieldConfig::new("Data record", LllVar, 0));
    add(73, FieldConfig::new("Date, Action", Fixed, 6));
    add(93, FieldConfig::new("Transaction destination institution ID", LlVar, 0));
    add(94, FieldConfig::new("Transaction originator institution ID", LlVar, 0));
    add(95, FieldConfig::new("Card issuer reference data", LlVar, 10));
    add(100, FieldConfig::new("Receiving institution ID", LlVar, 11));
    add(
        111,
        FieldConfig::new("Amount, currency conversion assignment", LllVar, 0),
    );
    add(123, FieldConfig::new("Additional data 3", LllVar, 0).with_processor(Pds));
    add(124, FieldConfig::new("Additional data 4", LllVar, 0).with_processor(Pds));
    add(125, FieldConfig::new("Additional data 5", LllVar, 0).with_processor(Pds));
    add(127, FieldConfig::new("Network data", LllVar, 0));
    config
}

/// Layouts for the standard IPM parameter extract tables.
pub fn default_parameter_tables() -> ParamTables {
    let mut tables = ParamTables::new();

    let mut layout = |fields: &[(&str, usize, usize)]| -> TableLayout {
        fields
            .iter()
            .map(|&(name, start, end)| (name.to_string(), FieldSpan::new(start, end)))
            .collect()
    };

    tables.insert(
        "IP0006T1".to_string(),
        layout(&[
            ("effective_timestamp", 1, 10),
            ("active_inactive_code", 7, 8),
            ("table_id", 8, 11),
            ("card_program_id", 11, 14),
            ("data_element_id", 14, 17),
            ("data_element_name", 17, 74),
            ("data_element_format", 74, 77),
        ]),
    );
    tables.insert(
        "IP0040T1".to_string(),
        layout(&[
            ("effective_timestamp", 1, 7),
            ("active_inactive_code", 7, 8),
            ("table_id", 8, 11),
            ("low_range", 11, 30),
            ("gcms_product", 30, 33),
            ("high_range", 33, 52),
            ("card_program_identifier", 52, 55),
            ("card_program_priority", 55, 57),
            ("member_id", 57, 68),
            ("product_type", 68, 69),
            ("endpoint", 69, 76),
            ("card_country_alpha", 76, 79),
            ("card_country_numeric", 79, 82),
            ("card_region", 82, 83),
            ("product_class", 83, 86),
            ("tran_routing_ind", 86, 87),
            ("first_present_reassign_ind", 87, 88),
            ("product_reassign_switch", 88, 89),
            ("pwcb_optin_switch", 89, 90),
            ("licenced_product_id", 90, 93),
            ("mapping_service_ind", 93, 94),
            ("alm_participation_ind", 94, 95),
            ("alm_activation_date", 95, 101),
            ("cardholder_billing_currency_default", 101, 104),
            ("cardholder_billing_currency_default_exponent", 104, 105),
            ("cardholder_bill_primary_currency", 105, 133),
            ("chip_to_magstripe_conversion_service_indicator", 133, 134),
            ("floor_exp_date", 134, 140),
            ("co_brand_participation_switch", 140, 141),
            ("spend_control_switch", 141, 142),
            ("merchant_cleansing_service_participation", 142, 145),
            ("merchant_cleansing_activation_date", 145, 151),
            ("paypass_enabled_indicator", 151, 152),
            ("rate_type_indicator", 152, 153),
            ("psn_route_indicator", 153, 154),
            ("cash_back_wo_purchase_ind", 154, 155),
        ]),
    );
    tables.insert(
        "IP0075T1".to_string(),
        layout(&[("mcc_code", 12, 16), ("cab_code", 16, 20)]),
    );
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_shape() {
        let config = default_bit_config();
        assert_eq!(config[&2].field_type, FieldType::LlVar);
        assert_eq!(config[&3].length, 6);
        assert_eq!(config[&48].processor, Some(FieldProcessor::Pds));
        assert_eq!(config[&55].processor, Some(FieldProcessor::Icc));
        assert_eq!(config[&12].date_format(), "%y%m%d%H%M%S");
        assert_eq!(config[&73].date_format(), DEFAULT_DATE_FORMAT);
    }

    #[test]
    fn test_pds_slots_ascend() {
        let config = default_bit_config();
        let slots: Vec<u8> = config
            .iter()
            .filter(|(_, f)| f.processor == Some(FieldProcessor::Pds))
            .map(|(&bit, _)| bit)
            .collect();
        assert_eq!(slots, vec![48, 62, 123, 124, 125]);
    }

    #[test]
    fn test_parameter_table_layouts() {
        let tables = default_parameter_tables();
        let ip0006 = &tables["IP0006T1"];
        assert_eq!(ip0006["data_element_name"], FieldSpan::new(17, 74));
        assert!(tables.contains_key("IP0040T1"));
        assert_eq!(tables["IP0075T1"].len(), 2);
    }
}
