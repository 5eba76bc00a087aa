//! Schema description handed to the LLM.
//!
//! Tables are rendered as `CREATE TABLE` blocks built from
//! `INFORMATION_SCHEMA.COLUMNS`, optionally followed by a few sample rows, and
//! a final list of foreign key relationships.

use super::QueryOutput;

/// Columns of every base table, in declaration order.
pub const COLUMNS_QUERY: &str = "\
SELECT c.TABLE_SCHEMA, c.TABLE_NAME, c.COLUMN_NAME, c.DATA_TYPE,
       c.CHARACTER_MAXIMUM_LENGTH, c.NUMERIC_PRECISION, c.NUMERIC_SCALE, c.IS_NULLABLE
FROM INFORMATION_SCHEMA.COLUMNS c
INNER JOIN INFORMATION_SCHEMA.TABLES t
    ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
WHERE t.TABLE_TYPE = 'BASE TABLE'
ORDER BY c.TABLE_SCHEMA, c.TABLE_NAME, c.ORDINAL_POSITION";

/// Every base table.
pub const TABLES_QUERY: &str = "\
SELECT TABLE_SCHEMA, TABLE_NAME
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_SCHEMA, TABLE_NAME";

/// Foreign key column pairs.
pub const FOREIGN_KEYS_QUERY: &str = "\
SELECT
    tp.name AS Parent_Table,
    cp.name AS Parent_Column,
    tr.name AS Referenced_Table,
    cr.name AS Referenced_Column
FROM sys.foreign_keys fk
INNER JOIN sys.foreign_key_columns fkc ON fk.object_id = fkc.constraint_object_id
INNER JOIN sys.tables tp ON fkc.parent_object_id = tp.object_id
INNER JOIN sys.columns cp ON fkc.parent_object_id = cp.object_id AND fkc.parent_column_id = cp.column_id
INNER JOIN sys.tables tr ON fkc.referenced_object_id = tr.object_id
INNER JOIN sys.columns cr ON fkc.referenced_object_id = cr.object_id AND fkc.referenced_column_id = cr.column_id";

const DEFAULT_SCHEMA: &str = "dbo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    /// Character or binary length; -1 means MAX
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
}

impl ColumnInfo {
    /// Type as written in DDL, e.g. `nvarchar(50)` or `decimal(10,2)`.
    pub fn type_name(&self) -> String {
        let ty = self.data_type.to_lowercase();
        match ty.as_str() {
            "char" | "varchar" | "nchar" | "nvarchar" | "binary" | "varbinary" => {
                match self.max_length {
                    Some(-1) => format!("{}(max)", ty),
                    Some(n) => format!("{}({})", ty, n),
                    None => ty,
                }
            }
            "decimal" | "numeric" => match (self.precision, self.scale) {
                (Some(p), Some(s)) => format!("{}({},{})", ty, p, s),
                _ => ty,
            },
            _ => ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Bracket-quoted `[schema].[table]`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(&self.name))
    }

    /// Name shown to users: bare for `dbo`, `schema.table` otherwise.
    pub fn display_name(&self) -> String {
        display_name(&self.schema, &self.name)
    }

    pub fn create_statement(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                format!(
                    "\t{} {}{}",
                    quote_identifier(&c.name),
                    c.type_name(),
                    if c.nullable { " NULL" } else { " NOT NULL" }
                )
            })
            .collect();
        format!(
            "CREATE TABLE {} (\n{}\n)",
            self.qualified_name(),
            columns.join(",\n")
        )
    }

    /// Statement fetching up to `n` sample rows.
    pub fn sample_query(&self, n: usize) -> String {
        format!("SELECT TOP ({}) * FROM {}", n, self.qualified_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub parent_table: String,
    pub parent_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Bracket-quote an identifier, doubling any closing bracket.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

pub fn display_name(schema: &str, table: &str) -> String {
    if schema.eq_ignore_ascii_case(DEFAULT_SCHEMA) {
        table.to_string()
    } else {
        format!("{}.{}", schema, table)
    }
}

/// Group [`COLUMNS_QUERY`] rows into tables, keeping query order.
pub fn tables_from_columns(output: &QueryOutput) -> Vec<TableInfo> {
    let mut tables: Vec<TableInfo> = Vec::new();
    for i in 0..output.row_count() {
        let (Some(schema), Some(table), Some(column)) =
            (output.get(i, 0), output.get(i, 1), output.get(i, 2))
        else {
            continue;
        };

        let info = ColumnInfo {
            name: column.to_string(),
            data_type: output.get(i, 3).unwrap_or("sql_variant").to_string(),
            max_length: output.get(i, 4).and_then(|v| v.parse().ok()),
            precision: output.get(i, 5).and_then(|v| v.parse().ok()),
            scale: output.get(i, 6).and_then(|v| v.parse().ok()),
            nullable: output.get(i, 7).is_some_and(|v| v.eq_ignore_ascii_case("YES")),
        };

        match tables.last_mut() {
            Some(last) if last.schema == schema && last.name == table => last.columns.push(info),
            _ => tables.push(TableInfo {
                schema: schema.to_string(),
                name: table.to_string(),
                columns: vec![info],
            }),
        }
    }
    tables
}

/// Table names from [`TABLES_QUERY`] rows.
pub fn table_names_from(output: &QueryOutput) -> Vec<String> {
    (0..output.row_count())
        .filter_map(|i| Some(display_name(output.get(i, 0)?, output.get(i, 1)?)))
        .collect()
}

/// Foreign keys from [`FOREIGN_KEYS_QUERY`] rows.
pub fn foreign_keys_from(output: &QueryOutput) -> Vec<ForeignKey> {
    (0..output.row_count())
        .filter_map(|i| {
            Some(ForeignKey {
                parent_table: output.get(i, 0)?.to_string(),
                parent_column: output.get(i, 1)?.to_string(),
                referenced_table: output.get(i, 2)?.to_string(),
                referenced_column: output.get(i, 3)?.to_string(),
            })
        })
        .collect()
}

/// Assemble the full schema text.
///
/// `samples` pairs each table (by index) with its sample rows, if any were fetched.
pub fn render_schema(
    tables: &[TableInfo],
    samples: &[Option<QueryOutput>],
    foreign_keys: &[ForeignKey],
) -> String {
    let mut blocks = Vec::with_capacity(tables.len() + 1);
    for (i, table) in tables.iter().enumerate() {
        let mut block = table.create_statement();
        if let Some(Some(sample)) = samples.get(i) {
            block.push_str(&format!(
                "\n\n/*\n{} rows from {} table:\n{}\n*/",
                sample.row_count(),
                table.display_name(),
                sample
            ));
        }
        blocks.push(block);
    }

    if !foreign_keys.is_empty() {
        let lines: Vec<String> = foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "{}.{} -> {}.{}",
                    fk.parent_table, fk.parent_column, fk.referenced_table, fk.referenced_column
                )
            })
            .collect();
        blocks.push(format!("Foreign Key Relationships:\n{}", lines.join("\n")));
    }

    blocks.join("\n\n")
}
