//! # Auxiliary Task Prompts
//!
//! Prompts for the helper tasks around query generation: explaining a query to a
//! non-technical user and proposing questions worth asking of a schema.

// --- SQL Explanation ---
pub const EXPLAIN_SQL_SYSTEM_PROMPT: &str = r#"You are a patient data analyst. Explain queries in plain language for non-technical readers. Be concise."#;

/// Placeholders: `{prompt}`, `{sql}`
pub const EXPLAIN_SQL_USER_PROMPT: &str = r#"# Original Question
{prompt}

# SQL Query
```sql
{sql}
```

Explain what this query does in simple terms:
1. Which tables and columns are used?
2. What filtering or conditions are applied?
3. How are the results grouped or ordered?
4. What will the output look like?"#;

// --- Question Suggestions ---
pub const SUGGEST_QUESTIONS_SYSTEM_PROMPT: &str = r#"You are a data analyst who helps business users discover what their data can answer."#;

/// Placeholders: `{context}`, `{count}`
pub const SUGGEST_QUESTIONS_USER_PROMPT: &str = r#"# Database Schema
{context}

Based on this schema, suggest {count} interesting questions that could be answered with a SQL query.

Format your response as a numbered list:
1. [question]
2. [question]

Focus on questions that would provide valuable business insights."#;
