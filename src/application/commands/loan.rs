//! `loan <lenderID> <amount>`: ask another user for coins
//!
//! Resolution happens in the dispatcher's loan shortcut when the lender reacts.

use async_trait::async_trait;

use crate::application::errors::CommandError;
use crate::application::handler::{CommandContext, CommandHandler};
use crate::application::loan::LoanRequest;
use crate::domain::entities::UserId;

pub struct LoanCommand;

impl LoanCommand {
    async fn display_name(ctx: &CommandContext, id: &UserId) -> String {
        if let Ok(Some(user)) = ctx.services.store.find_user(id).await {
            if !user.name.is_empty() {
                return user.name;
            }
        }
        match ctx.services.api.user_info(id).await {
            Ok(Some(info)) => info.name,
            _ => id.to_string(),
        }
    }
}

#[async_trait]
impl CommandHandler for LoanCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let (Some(lender), Some(amount)) = (ctx.arg(0), ctx.arg(1)) else {
            ctx.reply(&format!("❌ Usage: {}loan <lenderID> <amount>", ctx.prefix()))
                .await?;
            return Ok(());
        };
        let amount: i64 = amount
            .parse()
            .map_err(|_| CommandError::InvalidArgs(format!("'{}' is not a valid amount", amount)))?;

        let request = LoanRequest::new(lender, ctx.sender().clone(), amount)?;
        if ctx.services.store.find_currency(&request.lender_id).await?.is_none() {
            ctx.reply(&format!("❌ User {} has no account", request.lender_id)).await?;
            return Ok(());
        }

        let lender_name = Self::display_name(ctx, &request.lender_id).await;
        let borrower_name = Self::display_name(ctx, &request.borrower_id).await;
        let request = request.with_names(lender_name, borrower_name);

        let prompt = ctx.send(&request.prompt()).await?;
        tracing::info!(
            "Loan request {} -> {} for {} pending on {}",
            request.borrower_id,
            request.lender_id,
            request.amount,
            prompt
        );
        ctx.services.interactions.create_loan(prompt, request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::application::commands::testkit::TestBot;

    #[tokio::test]
    async fn test_loan_registers_pending_request() {
        let bot = TestBot::new().await;
        bot.store_user("L1", "Lena").await;
        bot.store_money("L1", 100).await;

        bot.run_as("B1", "loan L1 50").await;
        let prompt = bot.api.sent().last().cloned().unwrap();
        assert!(prompt.body.contains("Lena"));

        let pending = bot
            .services
            .interactions
            .loans
            .find(&prompt.id, |_| true)
            .expect("loan pending");
        assert_eq!(pending.value.data.amount, 50);
        assert_eq!(pending.value.data.lender_id.as_str(), "L1");
    }

    #[tokio::test]
    async fn test_loan_rejects_bad_amount() {
        let bot = TestBot::new().await;
        bot.store_money("L1", 100).await;
        bot.run_as("B1", "loan L1 -5").await;
        assert!(bot.last_body().contains("positive"));
        assert!(bot.services.interactions.loans.is_empty());
    }
}
