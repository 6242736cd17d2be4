//! Stage Prompts
//!
//! Every model-backed stage builds its prompt here. Each prompt opens with a
//! distinct expert persona; the persona strings in [`roles`] double as the
//! markers scripted replies are keyed on.

use crate::ai::PromptBuilder;

/// Expert personas, one per model-backed call
pub mod roles {
    pub const API_DESIGNER: &str = "API designer";
    pub const DATABASE_ARCHITECT: &str = "database architect";
    pub const BUSINESS_ANALYST: &str = "business analyst";
    pub const SECURITY_ANALYST: &str = "security analyst";
    pub const MODEL_DEVELOPER: &str = "SQLAlchemy ORM";
    pub const ROUTE_DEVELOPER: &str = "FastAPI route modules";
    pub const REVIEWER: &str = "quality assurance engineer";
}

const JSON_REPLY: &str = "Reply with a single fenced ```json block and nothing else inside the fence.";

const FILE_REPLY: &str = "Emit every file as a bold relative path line such as **app/models/user.py**, \
immediately followed by a ```python fenced block holding the complete file contents.";

fn document_extraction(
    expertise: &str,
    specialty: &str,
    goal: &str,
    points: Vec<&str>,
    document: &str,
    shape: &str,
) -> String {
    PromptBuilder::new()
        .role(expertise, specialty)
        .section("Task", goal)
        .objectives(points)
        .section("Requirements Document", document)
        .output_format(&format!("{}\n{}", shape, JSON_REPLY))
        .build()
}

pub fn api_endpoints(document: &str) -> String {
    document_extraction(
        roles::API_DESIGNER,
        "REST API design",
        "Extract every API endpoint that the following requirements document asks to be implemented.",
        vec![
            "The HTTP method (GET, POST, PUT, DELETE, etc.)",
            "The route path",
            "Request parameters and their types",
            "Response structure and status codes",
            "Authentication requirements",
        ],
        document,
        "A JSON object with an \"endpoints\" list, one entry per endpoint.",
    )
}

pub fn database_schema(document: &str) -> String {
    document_extraction(
        roles::DATABASE_ARCHITECT,
        "relational schema design",
        "Extract the database schema that the following requirements document implies.",
        vec![
            "The table name",
            "All fields/columns with their data types",
            "Primary keys and foreign keys",
            "Relationships with other tables",
            "Any constraints or validations",
        ],
        document,
        "A JSON object with a \"tables\" list, one entry per table.",
    )
}

pub fn business_logic(document: &str) -> String {
    document_extraction(
        roles::BUSINESS_ANALYST,
        "software requirements",
        "Extract the business logic that the following requirements document describes.",
        vec![
            "Core business rules",
            "Validation requirements",
            "Calculation or processing logic",
            "Workflow steps",
            "Integration requirements",
        ],
        document,
        "A JSON object with a \"components\" list of business logic components.",
    )
}

pub fn auth_requirements(document: &str) -> String {
    document_extraction(
        roles::SECURITY_ANALYST,
        "authentication and authorization",
        "Extract the authentication and authorization requirements of the following requirements document.",
        vec![
            "Authentication methods (JWT, OAuth, etc.)",
            "User roles and permissions",
            "Access control requirements",
            "Security constraints",
        ],
        document,
        "A single JSON object describing methods, roles, access control and constraints.",
    )
}

pub fn database_models(schema_json: &str) -> String {
    PromptBuilder::new()
        .role("Python developer", roles::MODEL_DEVELOPER)
        .section("Task", "Generate SQLAlchemy models for the following database schema.")
        .code("json", schema_json)
        .objectives(vec![
            "Use SQLAlchemy 2.0 syntax with type annotations",
            "Inherit from the Base class imported from app.services.database",
            "Include proper relationships between models",
            "Add appropriate indexes and constraints",
            "Include docstrings for each model and field",
        ])
        .focus(
            "one file per model under app/models",
            vec![
                "Label each file app/models/<name>.py",
                "Do NOT emit app/models/base.py, it already exists",
            ],
        )
        .output_format(FILE_REPLY)
        .build()
}

pub fn api_routes(endpoints: &str, schema: &str, logic: &str, auth: &str) -> String {
    PromptBuilder::new()
        .role("Python developer", roles::ROUTE_DEVELOPER)
        .section("Task", "Generate FastAPI route files for the following API endpoints.")
        .code("json", endpoints)
        .section("Database Schema", &format!("```json\n{}\n```", schema))
        .section("Business Logic", &format!("```json\n{}\n```", logic))
        .section("Authentication Requirements", &format!("```json\n{}\n```", auth))
        .objectives(vec![
            "Use FastAPI's dependency injection for database sessions",
            "Implement proper request and response models using Pydantic",
            "Include appropriate error handling",
            "Add comprehensive docstrings and OpenAPI documentation",
            "Implement authentication and authorization as required",
        ])
        .focus(
            "one file per logical group of endpoints under app/api/routes",
            vec!["Label each file with its name only, e.g. **users.py**"],
        )
        .output_format(FILE_REPLY)
        .build()
}

pub struct ReviewInput<'a> {
    pub endpoints: &'a str,
    pub schema: &'a str,
    pub logic: &'a str,
    pub auth: &'a str,
    pub files: &'a str,
    pub valid_targets: &'a [&'a str],
}

pub fn validation(input: &ReviewInput<'_>) -> String {
    let targets = input
        .valid_targets
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(", ");

    PromptBuilder::new()
        .role(roles::REVIEWER, "FastAPI applications")
        .section(
            "Task",
            "Evaluate the following generated FastAPI project against its requirements.",
        )
        .section("API Endpoints", input.endpoints)
        .section("Database Schema", input.schema)
        .section("Business Logic", input.logic)
        .section("Authentication Requirements", input.auth)
        .section("Generated Files", input.files)
        .objectives(vec![
            "Completeness: Does the project include all required components?",
            "Correctness: Are the implementations correct and follow best practices?",
            "Consistency: Are naming conventions and patterns consistent?",
            "Functionality: Would the application work as expected?",
            "Security: Are security best practices followed?",
        ])
        .output_format(&format!(
            "A JSON object with the fields:\n\
             - \"valid\": boolean indicating if the project is valid\n\
             - \"score\": integer from 0-100 indicating overall quality\n\
             - \"issues\": list of identified issues\n\
             - \"recommendations\": list of recommendations for improvement\n\
             - \"regeneration_needed\": boolean indicating if regeneration is needed\n\
             - \"regeneration_target\": which component needs regeneration, one of: {}\n{}",
            targets, JSON_REPLY
        ))
        .build()
}
