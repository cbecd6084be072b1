//! Built-in tools that answer from verified claims alone.

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	auth::VerifiedIdentity,
	dispatch::{Tool, ToolContext, ToolError, ToolFuture},
};

/// Role that unlocks confidential data.
pub const ADMIN_ROLE: &str = "Admin";
/// Role that unlocks audit data.
pub const AUDITOR_ROLE: &str = "Auditor";

/// Every built-in tool, in registration order.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
	vec![
		Arc::new(UserInfoTool),
		Arc::new(CompanyInfoTool),
		Arc::new(SensitiveDataTool),
		Arc::new(AvailableResourcesTool),
	]
}

/// `get_user_info`: summary of the caller's identity claims.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserInfoTool;
impl Tool for UserInfoTool {
	fn name(&self) -> &str {
		"get_user_info"
	}

	fn description(&self) -> &str {
		"Returns the signed-in user's identifiers, profile, roles, and scopes."
	}

	fn call<'a>(&'a self, ctx: ToolContext<'a>, args: JsonValue) -> ToolFuture<'a> {
		Box::pin(async move {
			expect_no_arguments(&args)?;

			Ok(user_summary(ctx.identity))
		})
	}
}

/// `get_company_info`: company profile whose depth follows the caller's roles.
///
/// Callers without roles get the public tier; any role adds the user tier; `Auditor` or
/// `Admin` add audit data; `Admin` adds confidential data.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompanyInfoTool;
impl Tool for CompanyInfoTool {
	fn name(&self) -> &str {
		"get_company_info"
	}

	fn description(&self) -> &str {
		"Returns company information; the level of detail depends on the caller's roles."
	}

	fn call<'a>(&'a self, ctx: ToolContext<'a>, args: JsonValue) -> ToolFuture<'a> {
		Box::pin(async move {
			expect_no_arguments(&args)?;

			let info = company_info(ctx.identity);

			crate::obs::event!(
				info,
				subject = ctx.identity.subject(),
				access_level = info["access_level"].as_str(),
				"Returned company information."
			);

			Ok(info)
		})
	}
}

/// `get_sensitive_data`: sample documents restricted to the `Admin` role.
#[derive(Clone, Copy, Debug, Default)]
pub struct SensitiveDataTool;
impl Tool for SensitiveDataTool {
	fn name(&self) -> &str {
		"get_sensitive_data"
	}

	fn description(&self) -> &str {
		"Returns sensitive documents; requires the Admin role."
	}

	fn required_role(&self) -> Option<&str> {
		Some(ADMIN_ROLE)
	}

	fn call<'a>(&'a self, ctx: ToolContext<'a>, args: JsonValue) -> ToolFuture<'a> {
		Box::pin(async move {
			expect_no_arguments(&args)?;

			crate::obs::event!(info, subject = ctx.identity.subject(), "Sensitive data accessed.");

			Ok(json!({
				"status": "success",
				"required_role": ADMIN_ROLE,
				"user_roles": ctx.identity.roles(),
				"data": {
					"sensitive_documents": [
						{
							"id": "DOC-2025-001",
							"title": "Q4 2025 Financial Projections",
							"classification": "Confidential",
							"created_date": "2025-01-10",
						},
						{
							"id": "DOC-2025-002",
							"title": "M&A Strategy Document",
							"classification": "Top Secret",
							"created_date": "2025-01-25",
						},
					],
					"access_granted_to": ctx.identity.subject(),
				},
			}))
		})
	}
}

/// `list_available_resources`: what the caller's roles unlock.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvailableResourcesTool;
impl Tool for AvailableResourcesTool {
	fn name(&self) -> &str {
		"list_available_resources"
	}

	fn description(&self) -> &str {
		"Lists the resources and tools available to the caller's roles."
	}

	fn call<'a>(&'a self, ctx: ToolContext<'a>, args: JsonValue) -> ToolFuture<'a> {
		Box::pin(async move {
			expect_no_arguments(&args)?;

			let identity = ctx.identity;
			let mut resources = vec![resource(
				"Public company information",
				"Basic public company profile",
				"public",
				&["get_company_info"],
			)];

			if !identity.roles().is_empty() {
				resources.push(resource(
					"Detailed public information",
					"Employee count range, certifications",
					"user",
					&["get_company_info"],
				));
			}
			if identity.has_role(AUDITOR_ROLE) {
				resources.push(resource(
					"Audit information",
					"Financial audits and compliance status",
					"auditor",
					&["get_company_info"],
				));
			}
			if identity.has_role(ADMIN_ROLE) {
				resources.push(resource(
					"Confidential information",
					"Unreleased projects, detailed financials, strategic plans",
					"admin",
					&["get_company_info", "get_sensitive_data"],
				));
				resources.push(resource(
					"Executive compensation",
					"Compensation of the executive team",
					"admin",
					&["get_company_info"],
				));
			}

			Ok(json!({
				"user_info": {
					"name": identity.string_claim("name").or_else(|| identity.string_claim("upn")),
					"user_id": identity.subject(),
					"roles": identity.roles(),
				},
				"accessible_resources": resources,
			}))
		})
	}
}

fn expect_no_arguments(args: &JsonValue) -> Result<(), ToolError> {
	match args {
		JsonValue::Null => Ok(()),
		JsonValue::Object(map) if map.is_empty() => Ok(()),
		_ => Err(ToolError::InvalidArguments { reason: "this tool takes no arguments".into() }),
	}
}

fn resource(name: &str, description: &str, access_level: &str, tools: &[&str]) -> JsonValue {
	json!({
		"resource": name,
		"description": description,
		"access_level": access_level,
		"tools": tools,
	})
}

fn user_summary(identity: &VerifiedIdentity) -> JsonValue {
	let claim = |name: &str| identity.claim(name).cloned().unwrap_or(JsonValue::Null);

	json!({
		"subject": identity.subject(),
		"client_id": identity.client_id(),
		"tenant_id": identity.tenant_id(),
		"issuer": identity.issuer(),
		"object_id": claim("oid"),
		"user_principal_name": claim("upn"),
		"email": identity.string_claim("email").or_else(|| identity.string_claim("preferred_username")),
		"name": claim("name"),
		"given_name": claim("given_name"),
		"family_name": claim("family_name"),
		"job_title": claim("job_title"),
		"department": claim("department"),
		"office_location": claim("office_location"),
		"scopes": identity.scopes().as_slice(),
		"roles": identity.roles(),
		"amr": claim("amr"),
		"auth_methods": claim("amr"),
		"issued_at": claim("iat"),
		"expires_at": claim("exp"),
		"not_before": claim("nbf"),
		"app_id": claim("appid"),
		"azp": claim("azp"),
		"idp": claim("idp"),
		"ver": claim("ver"),
	})
}

fn company_info(identity: &VerifiedIdentity) -> JsonValue {
	let is_admin = identity.has_role(ADMIN_ROLE);
	let mut info = json!({
		"access_level": "public",
		"user_roles": identity.roles(),
		"company_name": "Contoso Corporation",
		"founded_year": 1995,
		"public_contact": {
			"email": "info@contoso.com",
			"phone": "+1-555-0100",
			"website": "https://www.contoso.com",
		},
		"headquarters": "Seattle, WA, USA",
		"industry": "Technology",
	});

	if !identity.roles().is_empty() {
		info["access_level"] = "user".into();
		info["public_info"] = json!({
			"employee_count_range": "1000-5000",
			"stock_symbol": "CTSO",
			"description": "Leading provider of cloud-based business solutions",
			"certifications": ["ISO 27001", "SOC 2 Type II"],
		});
	}
	if is_admin || identity.has_role(AUDITOR_ROLE) {
		info["access_level"] = "auditor".into();
		info["audit_info"] = json!({
			"employee_count": 2847,
			"annual_revenue_usd": 450_000_000,
			"fiscal_year_end": "2025-12-31",
			"audit_firm": "Big Four Accounting LLP",
			"last_audit_date": "2025-01-15",
			"compliance_status": "Fully Compliant",
			"audit_reports": [
				{ "year": 2024, "status": "Clean Opinion", "date": "2025-01-15" },
				{ "year": 2023, "status": "Clean Opinion", "date": "2024-01-20" },
			],
		});
	}
	if is_admin {
		info["access_level"] = "admin".into();
		info["confidential_info"] = json!({
			"unreleased_projects": [
				{
					"code_name": "Project Phoenix",
					"description": "Next generation AI platform",
					"expected_launch": "Q3 2026",
					"budget_usd": 15_000_000,
				},
				{
					"code_name": "Project Horizon",
					"description": "Quantum computing initiative",
					"expected_launch": "Q1 2027",
					"budget_usd": 25_000_000,
				},
			],
			"financial_details": {
				"actual_revenue_usd": 453_728_942,
				"ebitda_usd": 89_456_231,
				"cash_reserves_usd": 127_500_000,
				"debt_usd": 45_000_000,
				"quarterly_growth_rate": 0.078,
			},
			"strategic_plans": {
				"market_expansion": ["Southeast Asia", "Latin America", "Middle East"],
				"acquisition_targets": ["CloudSecure Technologies", "DataViz Analytics"],
				"planned_headcount_increase": 450,
			},
			"executive_compensation": {
				"ceo_total_compensation_usd": 2_500_000,
				"cto_total_compensation_usd": 1_800_000,
				"cfo_total_compensation_usd": 1_750_000,
			},
		});
	}

	info
}
