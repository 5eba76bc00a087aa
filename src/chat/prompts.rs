//! Prompt templates and LLM response cleanup.

/// T-SQL rules appended to generation and correction prompts.
pub const SQL_SERVER_RULES: &str = r#"STRICT SQL SERVER RULES - YOU MUST FOLLOW THESE:
1. Use ONLY tables and columns from the schema above. Do not invent columns.
2. Use SQL Server T-SQL syntax:
   - TOP N instead of LIMIT N
   - GETDATE() for the current date and time
   - DATEPART(), YEAR(), MONTH(), DAY() for date parts
   - LEN() instead of LENGTH()
   - CHARINDEX() instead of LOCATE()
   - ISNULL() instead of COALESCE where possible
   - Square brackets [table].[column] for identifiers with spaces or reserved words
3. Only SELECT queries. Never INSERT, UPDATE, DELETE, DROP, CREATE or ALTER.
4. Qualify column names as table.column or [table].[column].
5. Use explicit JOIN syntax.
6. Use CASE WHEN for conditional logic.
7. Use GROUP BY with aggregate functions (COUNT, SUM, AVG, MIN, MAX).
8. Use ORDER BY for sorting results.
9. Return a single statement with no trailing semicolon."#;

/// Prompt asking for the SQL that answers `question`.
pub fn generation_prompt(question: &str, schema: &str, rules: &str) -> String {
    format!(
        r#"Convert this question to a SQL Server query: "{question}"

Database Schema:
{schema}

{rules}

Return the SQL only, with no explanation.

SQL:"#
    )
}

/// Prompt asking the LLM to repair `sql` after the server rejected it.
pub fn correction_prompt(
    sql: &str,
    error: &str,
    question: &str,
    schema: &str,
    rules: &str,
) -> String {
    format!(
        r#"This SQL query failed: {sql}
Error: {error}

Fix the query for this question: "{question}"

Schema:
{schema}

{rules}

Return corrected SQL only:"#
    )
}

/// Prompt asking for a natural-language reading of a result.
pub fn explanation_prompt(question: &str, sql: &str, result: &str) -> String {
    format!(
        r#"Question: "{question}"
SQL: {sql}
Result:
{result}

Explain the result in natural language. Answer the question directly using the actual values."#
    )
}

/// Prompt for direct mode, which only sees table names.
pub fn direct_prompt(question: &str, tables: &[String]) -> String {
    format!(
        r#"Given this question about the database: "{question}"

Generate a SQL Server SELECT query to answer this question.
Database tables available: {tables}

Return ONLY the SQL query, nothing else."#,
        tables = tables.join(", ")
    )
}

/// Remove Markdown code fences from an LLM reply.
///
/// Only applies when the reply starts with a fence; every fence line is then
/// dropped, including language tags like "```sql".
pub fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fenced_sql() {
        let reply = "```sql\nSELECT TOP 5 name\nFROM customers\n```";
        assert_eq!(strip_code_fences(reply), "SELECT TOP 5 name\nFROM customers");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_code_fences("\n```\nSELECT 1\n```\n"), "SELECT 1");
    }

    #[test]
    fn test_unfenced_reply_is_trimmed_only() {
        assert_eq!(strip_code_fences("  SELECT 1  \n"), "SELECT 1");
        // Fences after leading prose are left alone
        let reply = "Here you go:\n```sql\nSELECT 1\n```";
        assert_eq!(strip_code_fences(reply), reply);
    }

    #[test]
    fn test_generation_prompt_contents() {
        let schema = "CREATE TABLE [dbo].[Sales] (...)";
        let prompt = generation_prompt("top sellers", schema, SQL_SERVER_RULES);
        assert!(prompt.contains("\"top sellers\""));
        assert!(prompt.contains("CREATE TABLE [dbo].[Sales]"));
        assert!(prompt.contains("TOP N instead of LIMIT N"));
        assert!(prompt.trim_end().ends_with("SQL:"));
    }

    #[test]
    fn test_correction_prompt_contents() {
        let prompt = correction_prompt(
            "SELECT nme FROM customers",
            "Invalid column name 'nme'.",
            "list customers",
            "schema text",
            "rules text",
        );
        assert!(prompt.starts_with("This SQL query failed: SELECT nme FROM customers"));
        assert!(prompt.contains("Error: Invalid column name 'nme'."));
        assert!(prompt.contains("\"list customers\""));
        assert!(prompt.contains("schema text"));
        assert!(prompt.contains("rules text"));
    }

    #[test]
    fn test_direct_prompt_lists_tables() {
        let tables = vec!["Customers".to_string(), "sales.Orders".to_string()];
        let prompt = direct_prompt("how many orders", &tables);
        assert!(prompt.contains("Database tables available: Customers, sales.Orders"));
    }

    #[test]
    fn test_explanation_prompt_contents() {
        let prompt = explanation_prompt("how many", "SELECT COUNT(*) FROM t", "42");
        assert!(prompt.contains("SQL: SELECT COUNT(*) FROM t"));
        assert!(prompt.contains("Result:\n42"));
    }
}
