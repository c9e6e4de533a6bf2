//! Prompt construction for SQL generation.

/// System instruction sent with every completion request.
pub const SYSTEM_INSTRUCTION: &str = "Always return JSON with 'sql' and 'notes'.";

/// Static description of the queryable schema.
pub const SCHEMA: &str = "\
Database Schema:
- vendors(id, name, email, phone, address, category)
- customers(id, name, email, phone, address)
- invoices(id, invoiceNumber, vendorId, customerId, issueDate, dueDate, status, subtotal, tax, totalAmount, notes, categoryId)
- line_items(id, invoiceId, description, category, quantity, unitPrice, amount, tax)
- payments(id, invoiceId, amount, paymentDate, method, reference)
- categories(id, name)";

/// Builds the user prompt for `question`.
pub fn build_prompt(question: &str, max_rows: usize) -> String {
    format!(
        r#"You are a SQL expert. Generate a PostgreSQL SELECT query.

{SCHEMA}

Question: {question}

Rules:
1. Output JSON ONLY: {{"sql": "SELECT ...", "notes": "explanation"}}
2. Query must be READ-ONLY (SELECT only)
3. Use correct JOINs
4. Use GROUP BY / ORDER BY when needed
5. Limit result to {max_rows} rows
"#
    )
}
