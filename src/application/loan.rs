//! Loan correlation
//!
//! A loan prompt is registered in the loan table keyed by the prompt's
//! message id. Only the lender can resolve it: 👍 transfers the funds, 👎
//! declines. The entry is claimed before any funds move and put back when
//! the transfer cannot happen yet, so a retry by reacting again still works.

use serde::{Deserialize, Serialize};

use crate::application::errors::{BotError, CommandError};
use crate::application::handler::Services;
use crate::domain::entities::{MessageId, ThreadId, UserId};

pub const APPROVE: &str = "👍";
pub const DECLINE: &str = "👎";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub lender_id: UserId,
    pub borrower_id: UserId,
    pub lender_name: String,
    pub borrower_name: String,
    pub amount: i64,
}

impl LoanRequest {
    pub fn new(
        lender_id: impl Into<UserId>,
        borrower_id: impl Into<UserId>,
        amount: i64,
    ) -> Result<Self, CommandError> {
        let lender_id = lender_id.into();
        let borrower_id = borrower_id.into();
        if amount <= 0 {
            return Err(CommandError::InvalidArgs("Amount must be a positive number".to_string()));
        }
        if lender_id.is_unknown() || borrower_id.is_unknown() {
            return Err(CommandError::InvalidArgs("Both lender and borrower are required".to_string()));
        }
        if lender_id == borrower_id {
            return Err(CommandError::InvalidArgs("You cannot borrow from yourself".to_string()));
        }
        Ok(Self {
            lender_name: lender_id.to_string(),
            borrower_name: borrower_id.to_string(),
            lender_id,
            borrower_id,
            amount,
        })
    }

    pub fn with_names(mut self, lender: impl Into<String>, borrower: impl Into<String>) -> Self {
        self.lender_name = lender.into();
        self.borrower_name = borrower.into();
        self
    }

    pub fn prompt(&self) -> String {
        format!(
            "💰 LOAN REQUEST\n\n@{} asks @{} for {} coins.\n\n@{}: react 👍 to approve or 👎 to decline.",
            self.borrower_name, self.lender_name, self.amount, self.lender_name
        )
    }
}

/// True for the two reactions a lender can answer a loan prompt with
pub fn is_loan_reaction(reaction: &str) -> bool {
    reaction == APPROVE || reaction == DECLINE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanOutcome {
    Approved { lender_balance: i64, borrower_balance: i64 },
    Declined,
    InsufficientFunds { available: i64 },
    MissingAccount,
    /// No pending loan from this lender on the message, or not a loan reaction
    Ignored,
}

/// Resolve the loan prompt `message_id` with the lender's reaction
pub async fn resolve(
    services: &Services,
    thread_id: &ThreadId,
    message_id: &MessageId,
    reactor: &UserId,
    reaction: &str,
) -> Result<LoanOutcome, BotError> {
    if !is_loan_reaction(reaction) {
        return Ok(LoanOutcome::Ignored);
    }
    let loans = &services.interactions.loans;
    let Some(pending) = loans.take(message_id, |w| &w.data.lender_id == reactor) else {
        return Ok(LoanOutcome::Ignored);
    };
    let request = pending.value.data.clone();

    if reaction == DECLINE {
        if let Err(e) = services.api.unsend_message(thread_id, message_id).await {
            tracing::warn!("Failed to unsend loan prompt {}: {}", message_id, e);
        }
        let notice = format!(
            "❌ LOAN DECLINED\n\n@{} has declined @{}'s loan request for {} coins.",
            request.lender_name, request.borrower_name, request.amount
        );
        services.api.send_message(thread_id, &notice, None).await?;
        tracing::info!("Loan {} declined by {}", message_id, reactor);
        return Ok(LoanOutcome::Declined);
    }

    let accounts = async {
        let lender = services.store.find_currency(&request.lender_id).await?;
        let borrower = services.store.find_currency(&request.borrower_id).await?;
        Ok::<_, BotError>((lender, borrower))
    }
    .await;

    let (mut lender, mut borrower) = match accounts {
        Ok((Some(lender), Some(borrower))) => (lender, borrower),
        Ok(_) => {
            tracing::warn!("Loan {} references a missing currency record", message_id);
            loans.restore(message_id.clone(), pending);
            return Ok(LoanOutcome::MissingAccount);
        }
        Err(e) => {
            loans.restore(message_id.clone(), pending);
            return Err(e);
        }
    };

    if lender.money < request.amount {
        let available = lender.money;
        loans.restore(message_id.clone(), pending);
        let notice = format!(
            "❌ @{} doesn't have enough money to lend {} coins. They only have {} coins.",
            request.lender_name, request.amount, available
        );
        services.api.send_message(thread_id, &notice, None).await?;
        return Ok(LoanOutcome::InsufficientFunds { available });
    }

    lender.money -= request.amount;
    borrower.money += request.amount;
    services.store.save_currency(&lender).await?;
    services.store.save_currency(&borrower).await?;
    tracing::info!(
        "Loan {} approved: {} -> {} ({} coins)",
        message_id,
        request.lender_id,
        request.borrower_id,
        request.amount
    );

    let confirmation = format!(
        "💰 LOAN APPROVED\n\n✅ @{lender} has approved @{borrower}'s loan request for {amount} coins.\n\n\
         💵 @{lender}'s remaining balance: {lender_money} coins\n\
         💵 @{borrower}'s new balance: {borrower_money} coins\n\n\
         ⚠️ Remember to repay this loan!",
        lender = request.lender_name,
        borrower = request.borrower_name,
        amount = request.amount,
        lender_money = lender.money,
        borrower_money = borrower.money,
    );
    services.api.send_message(thread_id, &confirmation, None).await?;
    if let Err(e) = services.api.unsend_message(thread_id, message_id).await {
        tracing::warn!("Failed to unsend loan prompt {}: {}", message_id, e);
    }

    Ok(LoanOutcome::Approved {
        lender_balance: lender.money,
        borrower_balance: borrower.money,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(LoanRequest::new("L", "B", 0).is_err());
        assert!(LoanRequest::new("L", "L", 10).is_err());
        assert!(LoanRequest::new("0", "B", 10).is_err());
        let request = LoanRequest::new(" L ", "B", 50).unwrap();
        assert_eq!(request.lender_id.as_str(), "L");
    }

    #[test]
    fn test_loan_reactions() {
        assert!(is_loan_reaction("👍"));
        assert!(is_loan_reaction("👎"));
        assert!(!is_loan_reaction("❤"));
    }
}
