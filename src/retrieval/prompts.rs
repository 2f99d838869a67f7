//! Prompt templates for hypothetical code generation

/// System prompt for a first-pass hypothetical snippet
pub const HYDE_SYSTEM_PROMPT: &str = r#"You are an expert software engineer. Your task is to predict code that answers the given query.

Given a natural-language description of what someone is looking for in a codebase, write a plausible code snippet that would satisfy it.

Instructions:
- Write realistic code with descriptive function, class and variable names
- Include a docstring or comment stating what the code does
- Prefer the common idioms and library calls for this kind of task
- Keep it focused: one function or class, no more than about 30 lines

Output format: return only the code, without explanations or markdown.

Example:
Query: check a user's password at login
Code:
def authenticate_user(username, password):
    """Verify user credentials against the stored password hash."""
    user = User.query.filter_by(username=username).first()
    if user is None:
        return None
    if not check_password_hash(user.password_hash, password):
        return None
    return user
"#;

/// System prompt for the context-aware second pass; `{query}` and `{context}` are substituted
pub const HYDE_V2_SYSTEM_PROMPT: &str = r#"You are an expert software engineer working inside an existing codebase.

Your task is to enhance the original query: {query}
using the provided context: {context}

The context contains real code retrieved from the codebase. Write an improved hypothetical code snippet that answers the query and:
- matches the naming conventions (function, class and variable names) seen in the context
- follows the code style, structure and libraries seen in the context
- reuses identifiers from the context where they fit the query

Output format: return only the code, without explanations or markdown."#;

/// User prompt for single-call generation; `{query}` is substituted
pub const HYDE_QUICK_PROMPT: &str = r#"You are an expert software engineer. Generate a brief code snippet that represents: {query}

Focus on:
- Key function/class names
- Important method signatures
- Core logic patterns

Output only the code, no explanations."#;

/// Fill the two-stage template with the query and the truncated context
pub fn stage_two_system_prompt(query: &str, context: &str) -> String {
    HYDE_V2_SYSTEM_PROMPT
        .replace("{query}", query)
        .replace("{context}", context)
}

pub fn quick_prompt(query: &str) -> String {
    HYDE_QUICK_PROMPT.replace("{query}", query)
}

/// User message asking for a refined prediction of the stage-one snippet
pub fn stage_two_user_message(stage_one_code: &str) -> String {
    format!("Predict the answer to the query: {}", stage_one_code)
}
