/// Build the SQL-generation prompt
///
/// Pure function, no I/O. The schema text and the question are embedded
/// verbatim and the instruction block is fixed, so an unchanged schema and
/// question always produce byte-identical prompts.
pub fn build_prompt(dialect: &str, schema_text: &str, question: &str) -> String {
    format!(
        "You are an expert SQL query generator. \
         Your task is to convert natural language questions into correct SQL queries \
         for {dialect} databases.\n\
         \n\
         Database Schema Information:\n\
         {schema_text}\n\
         \n\
         User Question: {question}\n\
         \n\
         Provide ONLY the SQL query, with no additional text, explanation, or markdown \
         formatting. Use only the tables and columns listed in the schema above. \
         The query must be a single statement in valid {dialect} syntax.\n"
    )
}
