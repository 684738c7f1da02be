//! Dispatcher-related configs.
use std::path::PathBuf;

use snafu::{ResultExt, Snafu, ensure};
use table_dispatcher::{
    Dispatcher, FieldMap, Granularity, PartitionSource, PartitionSpec, PartitionTemplate,
    field_map::FieldMapParseError, partition::InvalidGranularity,
};

#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum ConfigurationError {
    #[snafu(display("Destination table name must not be empty"))]
    EmptyDestTable {},

    #[snafu(display("Invalid partition method: {source}"))]
    PartMethod { source: InvalidGranularity },

    #[snafu(display("Invalid field list: {source}"))]
    Fields { source: FieldMapParseError },

    #[snafu(display("Cannot read partition template file {}: {source}", path.display()))]
    ReadTemplate {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// CLI config for a table dispatcher.
#[derive(Debug, Clone, clap::Parser)]
pub struct DispatcherConfig {
    /// Base name of the destination table, optionally schema-qualified.
    ///
    /// When partitioning, rows go to `<dest-table>_YYYY_MM_DD` or
    /// `<dest-table>_YYYY_MM`.
    #[clap(long = "dest-table", env = "TABLE_DISPATCHER_DEST_TABLE", action)]
    pub dest_table: String,

    /// Row field holding the partition date.
    ///
    /// Leave empty to write every row to the destination table itself. The
    /// special value `_EVTIME` partitions by event creation time.
    #[clap(long = "part-field", env = "TABLE_DISPATCHER_PART_FIELD", action)]
    pub part_field: Option<String>,

    /// Partition granularity: `daily` or `monthly`.
    #[clap(
        long = "part-method",
        env = "TABLE_DISPATCHER_PART_METHOD",
        default_value = "daily",
        action
    )]
    pub part_method: String,

    /// Fields to write: `*` for all of them, or a comma separated list of
    /// `source[:dest]` entries, e.g. `id:order_id,amount`.
    #[clap(
        long = "fields",
        env = "TABLE_DISPATCHER_FIELDS",
        default_value = "*",
        action
    )]
    pub fields: String,

    /// DDL run to create a missing partition table.
    ///
    /// `_DEST_TABLE` is replaced by the quoted table name and `_SCHEMA_TABLE`
    /// by the table name with `.` replaced by `__`.
    #[clap(
        long = "part-template",
        env = "TABLE_DISPATCHER_PART_TEMPLATE",
        conflicts_with = "part_template_file",
        action
    )]
    pub part_template: Option<String>,

    /// File to read the partition template from.
    #[clap(
        long = "part-template-file",
        env = "TABLE_DISPATCHER_PART_TEMPLATE_FILE",
        action
    )]
    pub part_template_file: Option<PathBuf>,
}

impl DispatcherConfig {
    /// Validate the config and build the [`Dispatcher`] it describes.
    pub fn build(&self) -> Result<Dispatcher, ConfigurationError> {
        Ok(Dispatcher::new(
            self.field_map()?,
            self.partition_spec()?,
            self.template()?,
        ))
    }

    pub fn field_map(&self) -> Result<FieldMap, ConfigurationError> {
        self.fields.parse().context(FieldsSnafu)
    }

    /// The partition method is checked even when partitioning is disabled.
    pub fn partition_spec(&self) -> Result<PartitionSpec, ConfigurationError> {
        ensure!(!self.dest_table.trim().is_empty(), EmptyDestTableSnafu);
        let granularity: Granularity = self.part_method.parse().context(PartMethodSnafu)?;

        let spec = match self.part_field.as_deref().filter(|f| !f.is_empty()) {
            Some(field) => PartitionSpec::partitioned(
                &self.dest_table,
                PartitionSource::from_field_name(field),
                granularity,
            ),
            None => PartitionSpec::unpartitioned(&self.dest_table),
        };
        Ok(spec)
    }

    pub fn template(&self) -> Result<Option<PartitionTemplate>, ConfigurationError> {
        let sql = match (&self.part_template, &self.part_template_file) {
            (_, Some(path)) => {
                std::fs::read_to_string(path).context(ReadTemplateSnafu { path: path.clone() })?
            }
            (Some(sql), None) => sql.clone(),
            (None, None) => return Ok(None),
        };
        Ok(PartitionTemplate::from_config(&sql))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use clap::Parser;
    use table_dispatcher::FieldMapping;
    use tempfile::NamedTempFile;

    use super::*;

    fn parse(args: &[&str]) -> DispatcherConfig {
        DispatcherConfig::try_parse_from(std::iter::once("dispatcher").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&["--dest-table", "orders"]);

        assert_eq!(config.field_map().unwrap(), FieldMap::KeepAll);
        assert_eq!(
            config.partition_spec().unwrap(),
            PartitionSpec::unpartitioned("orders")
        );
        assert_eq!(config.template().unwrap(), None);
        config.build().unwrap();
    }

    #[test]
    fn dest_table_is_required() {
        assert!(DispatcherConfig::try_parse_from(["dispatcher"]).is_err());

        let config = parse(&["--dest-table", " "]);
        assert_matches!(
            config.build(),
            Err(ConfigurationError::EmptyDestTable {})
        );
    }

    #[test]
    fn partitioned_and_mapped() {
        let config = parse(&[
            "--dest-table",
            "reporting.orders",
            "--part-field",
            "created",
            "--part-method",
            "monthly",
            "--fields",
            "id:order_id, amount",
            "--part-template",
            "create table _DEST_TABLE () inherits (reporting.orders)",
        ]);

        let dispatcher = config.build().unwrap();

        assert_eq!(
            dispatcher.partition(),
            &PartitionSpec::partitioned(
                "reporting.orders",
                PartitionSource::Field("created".to_string()),
                Granularity::Monthly,
            )
        );
        assert_eq!(
            dispatcher.field_map(),
            &FieldMap::Mapped(vec![
                FieldMapping::new("id", "order_id"),
                FieldMapping::new("amount", "amount"),
            ])
        );
        assert_eq!(
            dispatcher.template().map(PartitionTemplate::as_str),
            Some("create table _DEST_TABLE () inherits (reporting.orders)")
        );
    }

    #[test]
    fn event_time_and_empty_part_field() {
        let config = parse(&["--dest-table", "audit", "--part-field", "_EVTIME"]);
        assert_eq!(
            config.partition_spec().unwrap().source(),
            Some(&PartitionSource::EventTime)
        );

        let config = parse(&["--dest-table", "audit", "--part-field", ""]);
        assert_eq!(config.partition_spec().unwrap().source(), None);
    }

    #[test]
    fn invalid_values() {
        let config = parse(&["--dest-table", "orders", "--part-method", "weekly"]);
        assert_matches!(
            config.build(),
            Err(ConfigurationError::PartMethod { source }) if source.0 == "weekly"
        );

        let config = parse(&["--dest-table", "orders", "--fields", "id,,name"]);
        assert_matches!(
            config.build(),
            Err(ConfigurationError::Fields {
                source: FieldMapParseError::EmptyEntry { .. }
            })
        );

        let config = parse(&["--dest-table", "orders", "--fields", "id,id:other"]);
        assert_matches!(
            config.build(),
            Err(ConfigurationError::Fields {
                source: FieldMapParseError::DuplicateSource { .. }
            })
        );
    }

    #[test]
    fn template_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "create table _DEST_TABLE () inherits (orders);").unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["--dest-table", "orders", "--part-template-file", path]);
        assert_eq!(
            config.template().unwrap().unwrap().as_str(),
            "create table _DEST_TABLE () inherits (orders);\n"
        );

        // blank file means no template
        let blank = NamedTempFile::new().unwrap();
        let path = blank.path().to_str().unwrap();
        let config = parse(&["--dest-table", "orders", "--part-template-file", path]);
        assert_eq!(config.template().unwrap(), None);
    }

    #[test]
    fn template_file_errors() {
        let config = parse(&[
            "--dest-table",
            "orders",
            "--part-template-file",
            "/does/not/exist.sql",
        ]);
        assert_matches!(
            config.build(),
            Err(ConfigurationError::ReadTemplate { path, .. }) if path == PathBuf::from("/does/not/exist.sql")
        );

        assert!(
            DispatcherConfig::try_parse_from([
                "dispatcher",
                "--dest-table",
                "orders",
                "--part-template",
                "create table _DEST_TABLE ()",
                "--part-template-file",
                "template.sql",
            ])
            .is_err()
        );
    }
}
