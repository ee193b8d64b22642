use super::*;

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 502,
            unit_id: 1,
            timeout_ms: 1000,
            register_table: RegisterTable::Holding,
        }
    }
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            byte_order: Endian::Big,
            word_order: Endian::Big,
            max_chunk_words: 100,
            max_gap_words: None,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: devices::EXAMPLE_METER.to_string(),
            registers: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: None,
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modbus: ModbusConfig::default(),
            decoding: DecodingConfig::default(),
            device: DeviceConfig::default(),
            logging: LoggingConfig::default(),
            poll_interval_ms: 10_000,
        }
    }
}
