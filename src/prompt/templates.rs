//! Built-in prompt templates.
//!
//! Every template ends by restating the output contract because small local
//! models drift back into prose after a few rounds.

/// First round of a repair loop.
pub const INITIAL_CODE: &str = "initial_code";

/// Every later round: the previous candidate and the error it raised.
pub const REPAIR: &str = "repair";

/// Rewrite existing code according to instructions.
pub const MODIFY: &str = "modify";

/// Turn a program brief into step-by-step build instructions.
pub const INSTRUCTIONS: &str = "instructions";

/// Document a code snippet.
pub const DOCUMENT: &str = "document";

/// Generate unit tests for a code snippet.
pub const UNIT_TESTS: &str = "unit_tests";

/// Follow-up question about the last working program.
pub const EXPLAIN: &str = "explain";

pub(crate) const BUILTIN: &[(&str, &str)] = &[
    (
        INITIAL_CODE,
        "{{instruction}}
Language: {{language}}
Note: Output must have only {{language}} code, do not add any other explanation.",
    ),
    (
        REPAIR,
        "The following {{language}} code fails with this error:
{{error}}

Code:
{{code}}

Fix the code so that it runs without errors.
Note: Output must have only {{language}} code, do not add any other explanation.",
    ),
    (
        MODIFY,
        "Modify the following code snippet based on these instructions:
Instructions: {{instructions}}
Code:
{{code}}

Provide only the revised code without explanations.",
    ),
    (
        INSTRUCTIONS,
        "Generate detailed step-by-step instructions for the following program context and user stories:
Program Context: {{context}}
User Stories:
{{stories}}
Other Instructions: {{instructions}}

Provide only bulleted instructions.",
    ),
    (
        DOCUMENT,
        "Document the following code snippet in detail with bullet points:
Code:
{{code}}

The documentation must include the following sections:
1. Introduction: A summary of what the program is attempting to perform.
2. Detailed Explanation: Each section of the code must be explained in as much detail as possible.

Provide the documentation.",
    ),
    (
        UNIT_TESTS,
        "Generate comprehensive unit tests for the following code:
Code:
{{code}}

Ensure the tests cover all edge cases and functionalities.
Provide the tests in the same language as the code.",
    ),
    (
        EXPLAIN,
        "Explain in detail, step by step, the following question about the code below:
Question: {{question}}

Code:
{{code}}",
    ),
];
