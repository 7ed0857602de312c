use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::alerts::AlertTrigger;
use crate::config::EmailConfig;
use crate::models::{AlertKind, TrackedProduct};
use crate::utils::error::Result;

/// Sends price alert emails over SMTP. When email is disabled the messages
/// are logged instead of transported, so the rest of the pipeline behaves
/// identically in development.
pub struct EmailNotifier {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let transport = if config.enabled {
            let mut builder = if config.use_tls {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            };
            builder = builder.port(config.smtp_port);

            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder =
                    builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            Some(builder.build())
        } else {
            info!("Email sending disabled - alerts will be logged only");
            None
        };

        Ok(Self { transport, config })
    }

    pub async fn send_alert(
        &self,
        product: &TrackedProduct,
        trigger: &AlertTrigger,
        to: &str,
    ) -> Result<()> {
        let subject = self.format_subject(product, trigger);
        let body = self.format_body(product, trigger);

        let Some(transport) = &self.transport else {
            info!("Email (simulated) to {}: {}", to, subject);
            debug!("Email body:\n{}", body);
            return Ok(());
        };

        let message = Message::builder()
            .from(format!("{} <{}>", self.config.from_name, self.config.from_address).parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        transport.send(message).await?;
        info!("Sent {} alert to {} for product {}", trigger.kind.as_str(), to, product.name);
        Ok(())
    }

    fn format_subject(&self, product: &TrackedProduct, trigger: &AlertTrigger) -> String {
        match trigger.kind {
            AlertKind::TargetReached => format!("Target price reached: {}", product.name),
            AlertKind::PriceDrop => format!(
                "Price drop alert: {} ({:.1}% off!)",
                product.name,
                trigger.percentage_change.unwrap_or(0.0)
            ),
        }
    }

    fn format_body(&self, product: &TrackedProduct, trigger: &AlertTrigger) -> String {
        match trigger.kind {
            AlertKind::TargetReached => format!(
                "Great news!\n\n\
                 The product you're tracking has reached your target price!\n\n\
                 Product: {}\n\
                 Store: {}\n\n\
                 Current Price: {}\n\
                 Your Target: {}\n\n\
                 This might be a good time to buy!\n\n\
                 Buy Now: {}\n\n\
                 --\n\
                 PricePulse - Your Price Tracking Assistant\n",
                product.name,
                product.source_site,
                trigger.trigger_price,
                product
                    .target_price
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                product.product_url
            ),
            AlertKind::PriceDrop => {
                let previous = trigger.previous_price.unwrap_or(trigger.trigger_price);
                let savings: Decimal = previous - trigger.trigger_price;
                format!(
                    "Price Drop Alert!\n\n\
                     A product you're tracking just got cheaper!\n\n\
                     Product: {}\n\
                     Store: {}\n\n\
                     New Price: {}\n\
                     Previous Price: {}\n\
                     You Save: {} ({:.1}% off!)\n\n\
                     Don't miss out on this deal!\n\n\
                     Buy Now: {}\n\n\
                     --\n\
                     PricePulse - Your Price Tracking Assistant\n",
                    product.name,
                    product.source_site,
                    trigger.trigger_price,
                    previous,
                    savings,
                    trigger.percentage_change.unwrap_or(0.0),
                    product.product_url
                )
            }
        }
    }
}
