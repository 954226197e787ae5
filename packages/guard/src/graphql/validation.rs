//! Variable screening for GraphQL requests

use async_graphql::Request;

use crate::error::GuardResult;
use crate::sanitizer::InputSanitizer;

/// Screen a request's variables before it is executed
///
/// Transports call this ahead of `Schema::execute`; a rejection aborts the
/// whole request.
pub fn validate_graphql_request(sanitizer: &InputSanitizer, request: &Request) -> GuardResult<()> {
    let variables = request.variables.clone().into_value().into_json()?;
    sanitizer.validate_variables(request.operation_name.as_deref(), &variables)
}
