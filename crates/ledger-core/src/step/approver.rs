use serde::{Deserialize, Serialize};

/// Quién puede firmar un paso hoja.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApproverRule {
    /// Un aprobador con nombre.
    User { user_id: String },
    /// Cualquier actor que tenga el permiso.
    Permission { permission: String },
    /// Cualquier actor asociado a la sucursal. `None` = la sucursal del
    /// documento.
    Branch { branch_id: Option<i64> },
}

impl ApproverRule {
    pub fn user(user_id: impl Into<String>) -> Self {
        ApproverRule::User { user_id: user_id.into() }
    }

    pub fn permission(permission: impl Into<String>) -> Self {
        ApproverRule::Permission { permission: permission.into() }
    }

    pub fn branch(branch_id: Option<i64>) -> Self {
        ApproverRule::Branch { branch_id }
    }

    /// Nombre estable del tipo de paso (columna `step_type`).
    pub fn step_type(&self) -> &'static str {
        match self {
            ApproverRule::User { .. } => "user_approval",
            ApproverRule::Permission { .. } => "permission_approval",
            ApproverRule::Branch { .. } => "branch_approval",
        }
    }

    /// Elegibilidad por sucursal. Sólo restringe a `Branch`: con sucursal fija
    /// debe coincidir con la del documento; sin ella, el documento tiene que
    /// traer sucursal o nadie podría firmar.
    pub fn matches_branch(&self, document_branch: Option<i64>) -> bool {
        match self {
            ApproverRule::Branch { branch_id: Some(b) } => document_branch == Some(*b),
            ApproverRule::Branch { branch_id: None } => document_branch.is_some(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_rule_matches_only_its_branch() {
        let rule = ApproverRule::branch(Some(1));
        assert!(rule.matches_branch(Some(1)));
        assert!(!rule.matches_branch(Some(2)));
        assert!(!rule.matches_branch(None));
        assert!(ApproverRule::branch(None).matches_branch(Some(7)));
        assert!(!ApproverRule::branch(None).matches_branch(None));
        assert!(ApproverRule::user("u1").matches_branch(Some(7)));
    }

    #[test]
    fn serde_tag_is_step_type_friendly() {
        let v = serde_json::to_value(ApproverRule::permission("vouchers.approve")).unwrap();
        assert_eq!(v["type"], "permission");
        assert_eq!(v["permission"], "vouchers.approve");
    }
}
