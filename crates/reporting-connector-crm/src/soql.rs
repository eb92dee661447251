//! SOQL query construction.

const OPPORTUNITY_FIELDS: &str = "Id, Name, AccountId, OwnerId, Type, IsClosed, CloseDate, \
     StageName, Amount, ExpectedRevenue, OpportunityNumber__c";

/// Quote a value as a SOQL string literal.
pub fn soql_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

pub fn opportunity_by_number(number: &str) -> String {
    format!(
        "SELECT {OPPORTUNITY_FIELDS} FROM Opportunity WHERE OpportunityNumber__c = {}",
        soql_literal(number)
    )
}

pub fn opportunity_by_id(id: &str) -> String {
    format!(
        "SELECT {OPPORTUNITY_FIELDS} FROM Opportunity WHERE Id = {}",
        soql_literal(id)
    )
}

pub fn owner_by_id(owner_id: &str) -> String {
    format!(
        "SELECT Name, Email, Title FROM User WHERE Id = {}",
        soql_literal(owner_id)
    )
}

pub fn account_by_id(account_id: &str) -> String {
    format!("SELECT Name FROM Account WHERE Id = {}", soql_literal(account_id))
}
